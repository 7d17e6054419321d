//! Buildable dependencies and source materialisation.
//!
//! A dependency expands its `sources` into concrete files, splits them by
//! filetype into synthesised object steps and derives its own output path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::Diagnostic;
use crate::engine::{Engine, EngineError};
use crate::registry::{Declaration, NodeData, TargetClass, TargetId};
use crate::schema::Validator;
use crate::target::{Spec, generator};
use crate::types::{Value, ValueKind};
use crate::util::paths::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
  Executable,
  StaticLibrary,
  SharedLibrary,
  Object,
  Source,
  Unknown,
}

impl DependencyKind {
  pub fn parse(s: &str) -> Option<Self> {
    Some(match s {
      "executable" => Self::Executable,
      "static_library" => Self::StaticLibrary,
      "shared_library" => Self::SharedLibrary,
      "object" => Self::Object,
      "source" => Self::Source,
      "unknown" => Self::Unknown,
      _ => return None,
    })
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Executable => "executable",
      Self::StaticLibrary => "static_library",
      Self::SharedLibrary => "shared_library",
      Self::Object => "object",
      Self::Source => "source",
      Self::Unknown => "unknown",
    }
  }

  /// File extension of outputs of this kind.
  pub fn ext(&self) -> &'static str {
    match self {
      Self::Executable => "",
      Self::StaticLibrary => ".a",
      Self::SharedLibrary => ".so",
      Self::Object => ".o",
      Self::Source | Self::Unknown => ".out",
    }
  }

  /// Linked kinds always take their output name from the target name.
  pub fn is_linked(&self) -> bool {
    matches!(self, Self::Executable | Self::StaticLibrary | Self::SharedLibrary)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
  /// Produced by the build.
  Internal,
  /// Passed through unchanged.
  Local,
}

impl Provider {
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "internal" => Some(Self::Internal),
      "local" => Some(Self::Local),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencySpec {
  pub name: String,
  pub dir: PathBuf,
  pub kind: DependencyKind,
  pub aliases: Vec<String>,
  pub dependencies: Vec<TargetId>,
  pub provider: Provider,
  /// Explicit generator, or the one picked from the environment on resolve.
  pub generator: Option<TargetId>,
  pub nofiletype: bool,
  pub sources: Value,
  pub environment: TargetId,
}

pub(super) fn validate(engine: &Engine, data: &NodeData) -> Result<Option<DependencySpec>, EngineError> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);

  let kind_name = v.string_or("kind", "unknown");
  let aliases = v.strings("aliases", false).unwrap_or_default();
  let dependencies = v.targets("dependencies", TargetClass::Target);
  let provider_name = v.string_or("provider", "internal");
  let generator = v.target("generator", TargetClass::Generator, false);
  let nofiletype = v.boolean("nofiletype", false);
  let sources = v
    .field(
      "sources",
      &[
        ValueKind::Files,
        ValueKind::Target(TargetClass::File),
        ValueKind::Array,
        ValueKind::String,
      ],
      false,
      None,
    )
    .unwrap_or(Value::Array(Vec::new()));
  let environment = v.target("environment", TargetClass::Environment, false);

  let kind = DependencyKind::parse(&kind_name);
  if kind.is_none() {
    v.error("kind", format!("unknown kind '{}'", kind_name));
  }
  let provider = Provider::parse(&provider_name);
  if provider.is_none() {
    v.error("provider", format!("unknown provider '{}'", provider_name));
  }
  let ok = v.finish();

  let environment = match environment.or_else(|| engine.registry().default_of(TargetClass::Environment)) {
    Some(environment) => environment,
    None => {
      return Err(engine.diagnostics().fatal(data.diagnostic("can't find a default for 'environment'")));
    }
  };

  if provider == Some(Provider::Local) && !dependencies.is_empty() {
    return Err(
      engine
        .diagnostics()
        .fatal(data.diagnostic("'local' provider dependency can't have dependencies")),
    );
  }

  let (Some(kind), Some(provider), true) = (kind, provider, ok) else {
    return Ok(None);
  };

  Ok(Some(DependencySpec {
    name: data.name.clone(),
    dir: data.dir.clone(),
    kind,
    aliases,
    dependencies,
    provider,
    generator,
    nofiletype,
    sources,
    environment,
  }))
}

/// Expand the environment, and pick a linker or archiver for linked kinds.
pub(super) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  let mut spec = engine.dependency_spec(id)?;
  engine.expand(spec.environment).await?;

  match spec.generator {
    Some(generator) => engine.expand(generator).await?,
    None => {
      let env = engine.environment_spec(spec.environment)?;
      let picked = match spec.kind {
        DependencyKind::Executable | DependencyKind::SharedLibrary => Some(("linker", env.linker)),
        DependencyKind::StaticLibrary => Some(("archiver", env.archiver)),
        _ => None,
      };

      if let Some((role, generator)) = picked {
        let Some(generator) = generator else {
          let message = format!("environment has no {}", role);
          return Err(engine.diagnostics().fatal(engine.node(id).diagnostic(message)));
        };
        engine.expand(generator).await?;
        spec.generator = Some(generator);
        engine.update_spec(id, Spec::Dependency(spec.clone()));
      }
    }
  }

  for dep in &spec.dependencies {
    engine.expand(*dep).await?;
  }
  Ok(())
}

/// Concrete source files, in declaration order.
///
/// Recomputed on every call, so files appearing between calls are picked up.
pub fn sources(engine: &Engine, id: TargetId) -> Result<Vec<PathBuf>, EngineError> {
  let spec = engine.dependency_spec(id)?;
  let before = engine.diagnostics().count();

  let mut out = Vec::new();
  expand_sources(engine, id, &spec.dir, &spec.sources, &mut out)?;

  if engine.diagnostics().count() > before {
    engine.diagnostics().checkpoint()?;
  }
  Ok(out)
}

fn expand_sources(
  engine: &Engine,
  owner: TargetId,
  dir: &Path,
  value: &Value,
  out: &mut Vec<PathBuf>,
) -> Result<(), EngineError> {
  match value {
    Value::String(pattern) => out.extend(glob_files(engine, owner, dir, pattern)),
    Value::Files(group) => {
      for source in &group.sources {
        expand_sources(engine, owner, &group.dir, source, out)?;
      }
    }
    Value::Array(items) => {
      for item in items {
        expand_sources(engine, owner, dir, item, out)?;
      }
    }
    Value::Target(file) if engine.node(*file).class() == TargetClass::File => {
      let (file_dir, name) = {
        let node = engine.node(*file);
        let data = node.data();
        (data.dir.clone(), data.name.clone())
      };
      let mut matches = glob_files(engine, *file, &file_dir, &name);
      match matches.len() {
        0 => out.push(normalize(&file_dir.join(&name))),
        1 => out.append(&mut matches),
        _ => {
          let diagnostic = engine.node(*file).diagnostic("file expands a glob, use 'files' instead");
          return Err(engine.diagnostics().fatal(diagnostic));
        }
      }
    }
    other => {
      let message = format!("source of type '{}' can't be expanded", describe(engine, other));
      engine.diagnostics().error(engine.node(owner).diagnostic(message));
    }
  }
  Ok(())
}

fn describe(engine: &Engine, value: &Value) -> String {
  match value {
    Value::String(_) => "string".to_string(),
    Value::Integer(_) => "integer".to_string(),
    Value::Boolean(_) => "boolean".to_string(),
    Value::Array(_) => "array".to_string(),
    Value::Table(_) => "table".to_string(),
    Value::Files(_) => "files".to_string(),
    Value::Target(id) => engine.node(*id).class().to_string(),
  }
}

/// Match a pattern relative to `dir`. Hidden files match and `**` recurses.
fn glob_files(engine: &Engine, owner: TargetId, dir: &Path, pattern: &str) -> Vec<PathBuf> {
  let full = if Path::new(pattern).is_absolute() {
    pattern.to_string()
  } else {
    format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern)
  };

  let entries = match glob::glob(&full) {
    Ok(entries) => entries,
    Err(e) => {
      let message = format!("invalid glob pattern '{}': {}", pattern, e);
      engine.diagnostics().error(engine.node(owner).diagnostic(message));
      return Vec::new();
    }
  };

  let mut out = Vec::new();
  for entry in entries {
    match entry {
      Ok(path) => out.push(normalize(&path)),
      Err(e) => {
        let message = format!("can't read '{}': {}", e.path().display(), e.error());
        engine.diagnostics().error(engine.node(owner).diagnostic(message));
      }
    }
  }
  out
}

/// Targets that must be generated before this one, synthesising one step per source.
pub async fn dependencies(engine: &Arc<Engine>, id: TargetId) -> Result<Vec<TargetId>, EngineError> {
  let spec = engine.dependency_spec(id)?;
  if spec.provider == Provider::Local {
    return Ok(Vec::new());
  }

  let mut out = Vec::new();
  for dep in &spec.dependencies {
    engine.expand(*dep).await?;
    out.push(*dep);
  }

  let origin = engine.node(id).data().origin.clone();
  for source in sources(engine, id)? {
    let filetype = engine.filetype_for(&source);
    if spec.kind == DependencyKind::Executable && filetype.is_none() {
      let message = format!("no filetype for '{}'", source.display());
      return Err(engine.diagnostics().fatal(engine.node(id).diagnostic(message)));
    }

    let pattern = glob::Pattern::escape(&source.to_string_lossy());
    let decl = match filetype {
      Some(filetype) if !spec.nofiletype => {
        engine.expand(filetype).await?;
        let generator = engine.filetype_spec(filetype)?.generator;
        let output = generator::output_name(engine, generator, &source, DependencyKind::Object)?;
        Declaration::new(TargetClass::Dependency, output.to_string_lossy())
          .field("sources", pattern)
          .field("environment", spec.environment)
          .field("generator", generator)
          .field("nofiletype", true)
          .field("kind", DependencyKind::Object.as_str())
      }
      _ => Declaration::new(TargetClass::Dependency, source.to_string_lossy())
        .field("sources", pattern)
        .field("environment", spec.environment)
        .field("provider", "local")
        .field("kind", DependencyKind::Source.as_str()),
    };

    let dep = engine.synthesize(decl.at(origin.clone()).in_dir(&spec.dir))?;
    engine.expand(dep).await?;
    out.push(dep);
  }

  Ok(out)
}

/// Path this dependency produces.
pub async fn output(engine: &Arc<Engine>, id: TargetId) -> Result<PathBuf, EngineError> {
  let spec = engine.dependency_spec(id)?;
  let sources = sources(engine, id)?;

  if spec.provider == Provider::Local {
    return match sources.into_iter().next() {
      Some(source) => Ok(source),
      None => Err(engine.diagnostics().fatal(engine.node(id).diagnostic("local dependency has no source"))),
    };
  }

  if sources.len() != 1 || spec.kind.is_linked() {
    return Ok(normalize(&spec.dir.join(format!("{}{}", spec.name, spec.kind.ext()))));
  }

  let source = &sources[0];
  let generator = match spec.generator {
    Some(generator) => generator,
    None => {
      let Some(filetype) = engine.filetype_for(source) else {
        let diagnostic = Diagnostic::new(format!("filetype matching file '{}' not found", source.display()));
        return Err(engine.diagnostics().fatal(diagnostic));
      };
      engine.expand(filetype).await?;
      engine.filetype_spec(filetype)?.generator
    }
  };
  generator::output_name(engine, generator, source, spec.kind)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{Toolchain, engine_at, write_files};
  use tempfile::TempDir;

  async fn setup(files: &[&str]) -> (TempDir, Arc<Engine>, Toolchain) {
    let temp = TempDir::new().unwrap();
    write_files(temp.path(), files);
    let engine = engine_at(temp.path());
    let toolchain = Toolchain::declare(&engine, "cp {in} {out}");
    (temp, engine, toolchain)
  }

  fn executable(engine: &Engine, name: &str, sources: &str) -> TargetId {
    engine
      .declare(
        Declaration::new(TargetClass::Dependency, name)
          .field("kind", "executable")
          .field("sources", sources),
      )
      .unwrap()
  }

  #[tokio::test]
  async fn sources_expand_globs_in_order() {
    let (temp, engine, _) = setup(&["b.c", "a.c", "notes.txt"]).await;
    let app = executable(&engine, "app", "*.c");
    engine.prepare_all().await.unwrap();

    let found = sources(&engine, app).unwrap();

    assert_eq!(found, vec![temp.path().join("a.c"), temp.path().join("b.c")]);
  }

  #[tokio::test]
  async fn two_sources_yield_two_object_steps() {
    let (temp, engine, toolchain) = setup(&["a.c", "b.c"]).await;
    let app = executable(&engine, "app", "*.c");
    engine.prepare_all().await.unwrap();
    engine.expand(app).await.unwrap();

    let deps = dependencies(&engine, app).await.unwrap();

    assert_eq!(deps.len(), 2);
    for (dep, stem) in deps.iter().zip(["a", "b"]) {
      let spec = engine.dependency_spec(*dep).unwrap();
      assert_eq!(spec.kind, DependencyKind::Object);
      assert!(spec.nofiletype);
      assert_eq!(spec.generator, Some(toolchain.cc));
      assert_eq!(spec.name, temp.path().join(format!("{}.o", stem)).to_string_lossy());
    }
  }

  #[tokio::test]
  async fn object_steps_are_shared_between_targets() {
    let (_temp, engine, _) = setup(&["a.c"]).await;
    let app = executable(&engine, "app", "a.c");
    let tool = executable(&engine, "tool", "a.c");
    engine.prepare_all().await.unwrap();
    engine.expand(app).await.unwrap();
    engine.expand(tool).await.unwrap();

    assert_eq!(
      dependencies(&engine, app).await.unwrap(),
      dependencies(&engine, tool).await.unwrap()
    );
  }

  #[tokio::test]
  async fn unknown_extension_becomes_a_local_source() {
    let (temp, engine, _) = setup(&["data.bin"]).await;
    let blob = engine
      .declare(
        Declaration::new(TargetClass::Dependency, "blob")
          .field("kind", "static_library")
          .field("sources", "*.bin"),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();
    engine.expand(blob).await.unwrap();

    let deps = dependencies(&engine, blob).await.unwrap();

    assert_eq!(deps.len(), 1);
    let spec = engine.dependency_spec(deps[0]).unwrap();
    assert_eq!(spec.provider, Provider::Local);
    assert_eq!(spec.kind, DependencyKind::Source);
    assert_eq!(output(&engine, deps[0]).await.unwrap(), temp.path().join("data.bin"));
  }

  #[tokio::test]
  async fn executable_without_filetype_is_fatal() {
    let (_temp, engine, _) = setup(&["main.rs"]).await;
    let app = executable(&engine, "app", "*.rs");
    engine.prepare_all().await.unwrap();
    engine.expand(app).await.unwrap();

    let err = dependencies(&engine, app).await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(ref m) if m.contains("no filetype for")));
  }

  #[tokio::test]
  async fn local_dependency_passes_its_source_through() {
    let (temp, engine, _) = setup(&["vendor.a"]).await;
    let vendor = engine
      .declare(
        Declaration::new(TargetClass::Dependency, "vendor")
          .field("provider", "local")
          .field("sources", "vendor.a"),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();
    engine.expand(vendor).await.unwrap();

    assert!(dependencies(&engine, vendor).await.unwrap().is_empty());
    assert_eq!(output(&engine, vendor).await.unwrap(), temp.path().join("vendor.a"));
  }

  #[tokio::test]
  async fn local_dependency_with_dependencies_is_fatal() {
    let (_temp, engine, _) = setup(&[]).await;
    let other = executable(&engine, "other", "*.c");
    engine
      .declare(
        Declaration::new(TargetClass::Dependency, "vendor")
          .field("provider", "local")
          .field("dependencies", vec![other]),
      )
      .unwrap();

    let err = engine.prepare_all().await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(ref m) if m.contains("can't have dependencies")));
  }

  #[tokio::test]
  async fn outputs_follow_kind() {
    let (temp, engine, _) = setup(&["a.c", "b.c"]).await;
    let app = executable(&engine, "app", "a.c");
    let mut ids = vec![app];
    for (name, kind) in [("core", "static_library"), ("plugin", "shared_library")] {
      ids.push(
        engine
          .declare(
            Declaration::new(TargetClass::Dependency, name)
              .field("kind", kind)
              .field("sources", "*.c"),
          )
          .unwrap(),
      );
    }
    engine.prepare_all().await.unwrap();

    let mut outputs = Vec::new();
    for id in ids {
      engine.expand(id).await.unwrap();
      outputs.push(output(&engine, id).await.unwrap());
    }

    assert_eq!(
      outputs,
      vec![
        temp.path().join("app"),
        temp.path().join("core.a"),
        temp.path().join("plugin.so"),
      ]
    );
  }

  #[tokio::test]
  async fn single_source_object_uses_the_filetype_generator() {
    let (temp, engine, _) = setup(&["main.c"]).await;
    let obj = engine
      .declare(
        Declaration::new(TargetClass::Dependency, "main")
          .field("kind", "object")
          .field("sources", "main.c"),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();
    engine.expand(obj).await.unwrap();

    assert_eq!(output(&engine, obj).await.unwrap(), temp.path().join("main.o"));
  }

  #[tokio::test]
  async fn linked_kinds_take_the_environment_toolchain() {
    let (_temp, engine, toolchain) = setup(&["a.c"]).await;
    let app = executable(&engine, "app", "a.c");
    let lib = engine
      .declare(
        Declaration::new(TargetClass::Dependency, "lib")
          .field("kind", "static_library")
          .field("sources", "a.c"),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();
    engine.expand(app).await.unwrap();
    engine.expand(lib).await.unwrap();

    assert_eq!(engine.dependency_spec(app).unwrap().generator, Some(toolchain.link));
    assert_eq!(engine.dependency_spec(lib).unwrap().generator, Some(toolchain.ar));
  }

  #[tokio::test]
  async fn file_target_expanding_to_many_files_is_fatal() {
    let (_temp, engine, _) = setup(&["a.c", "b.c"]).await;
    let file = engine.declare(Declaration::new(TargetClass::File, "*.c")).unwrap();
    let lib = engine
      .declare(
        Declaration::new(TargetClass::Dependency, "lib")
          .field("kind", "static_library")
          .field("sources", file),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();

    let err = sources(&engine, lib).unwrap_err();

    assert!(matches!(err, EngineError::Fatal(ref m) if m.contains("file expands a glob")));
  }
}
