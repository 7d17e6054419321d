//! Ninja build file generation.
//!
//! Instead of running generators itself, the ninja builder writes every rule
//! and build statement reachable from the working set into
//! `<builddir>/build.ninja` and hands the build over to the `ninja` executable.

mod writer;

pub use writer::{NinjaWriter, escape, escape_path};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::consts::{NINJA_FILE, NINJA_LINE_WIDTH, NINJA_REQUIRED_VERSION};
use crate::engine::{Engine, EngineError};
use crate::lifecycle::BoxFuture;
use crate::registry::{TargetClass, TargetId};
use crate::target::{Builder, Provider, dependency, external};

/// Emits a ninja file and runs the builder's executor on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NinjaBuilder;

#[async_trait]
impl Builder for NinjaBuilder {
  async fn build(&self, engine: &Arc<Engine>, builder: TargetId, targets: &[TargetId]) -> Result<(), EngineError> {
    let path = write_build_file(engine, targets).await?;
    info!(path = %path.display(), "wrote ninja file");

    let Some(executor) = engine.builder_spec(builder)?.executor else {
      return Err(engine.diagnostics().fatal(engine.node(builder).diagnostic("has no executor")));
    };
    let builddir = engine.options().builddir.clone();
    let args = ["-C".to_string(), builddir.display().to_string()];
    external::run(engine, executor, &args, &builddir).await?;
    Ok(())
  }
}

/// Write the ninja file for `targets`, returning its path.
pub async fn write_build_file(engine: &Arc<Engine>, targets: &[TargetId]) -> Result<PathBuf, EngineError> {
  let mut emitter = Emitter::new(engine);
  for target in targets {
    emitter.visit(*target).await?;
  }

  let path = engine.options().builddir.join(NINJA_FILE);
  tokio::fs::create_dir_all(&engine.options().builddir).await?;
  tokio::fs::write(&path, emitter.writer.finish()).await?;
  Ok(path)
}

struct Emitter<'a> {
  engine: &'a Arc<Engine>,
  writer: NinjaWriter,
  visited: HashSet<TargetId>,
}

impl<'a> Emitter<'a> {
  fn new(engine: &'a Arc<Engine>) -> Self {
    let mut writer = NinjaWriter::new(NINJA_LINE_WIDTH);
    writer.variable("ninja_required_version", NINJA_REQUIRED_VERSION, 0);
    writer.newline();
    writer.variable("builddir", ".", 0);
    writer.variable("rootdir", &engine.rootdir_from_builddir().display().to_string(), 0);
    writer.newline();

    Self {
      engine,
      writer,
      visited: HashSet::new(),
    }
  }

  fn visit(&mut self, id: TargetId) -> BoxFuture<'_, Result<(), EngineError>> {
    Box::pin(async move {
      if !self.visited.insert(id) {
        return Ok(());
      }

      let engine = self.engine;
      engine.expand(id).await?;
      match engine.node(id).class() {
        TargetClass::Generator => self.rule(id),
        TargetClass::Dependency => self.dependency(id).await,
        _ => Ok(()),
      }
    })
  }

  fn rule(&mut self, id: TargetId) -> Result<(), EngineError> {
    let spec = self.engine.generator_spec(id)?;
    let name = self.engine.node(id).data().name.clone();
    self.writer.rule(
      &name,
      &[
        ("command", Some(spec.command.as_str())),
        ("depfile", spec.depfile.as_deref()),
        ("deps", spec.deptype.as_deref()),
        ("rspfile", spec.rspfile.as_deref()),
        ("rspfile_content", spec.rspcontent.as_deref()),
      ],
    );
    self.writer.newline();
    Ok(())
  }

  async fn dependency(&mut self, id: TargetId) -> Result<(), EngineError> {
    let engine = self.engine;
    let spec = engine.dependency_spec(id)?;
    if let Some(generator) = spec.generator {
      self.visit(generator).await?;
    }

    let mut inputs = Vec::new();
    for dep in dependency::dependencies(engine, id).await? {
      self.visit(dep).await?;
      let input = input_path(engine, dep).await?;
      if !inputs.contains(&input) {
        inputs.push(input);
      }
    }

    if spec.provider != Provider::Internal || inputs.is_empty() {
      return Ok(());
    }

    let output = builddir_var(&engine.rootdir_relpath(&dependency::output(engine, id).await?));
    for alias in &spec.aliases {
      self.writer.build(&[alias.clone()], "phony", std::slice::from_ref(&output));
    }

    let rule = match spec.generator {
      Some(generator) => engine.node(generator).data().name.clone(),
      None => "phony".to_string(),
    };
    self.writer.build(&[output], &rule, &inputs);
    Ok(())
  }
}

fn builddir_var(rel: &Path) -> String {
  if rel.is_absolute() {
    rel.display().to_string()
  } else {
    format!("$builddir/{}", rel.display())
  }
}

/// Path of a dependency's output as seen by ninja.
async fn input_path(engine: &Arc<Engine>, dep: TargetId) -> Result<String, EngineError> {
  let node = engine.node(dep);
  let (output, internal) = match node.class() {
    TargetClass::Dependency => {
      let internal = engine.dependency_spec(dep)?.provider == Provider::Internal;
      (dependency::output(engine, dep).await?, internal)
    }
    TargetClass::External => (engine.external_spec(dep)?.require_path(engine, dep)?, false),
    class if class.is_path() => (engine.path_of(dep), false),
    _ => return Err(engine.diagnostics().fatal(node.diagnostic("can't be generated"))),
  };

  let rel = engine.rootdir_relpath(&output);
  Ok(if internal {
    builddir_var(&rel)
  } else if rel.is_absolute() {
    rel.display().to_string()
  } else {
    format!("$rootdir/{}", rel.display())
  })
}
