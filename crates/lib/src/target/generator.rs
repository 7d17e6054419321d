//! Command generators.
//!
//! A generator turns inputs into one output by running a shell command built
//! from its `command` template.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::execute::shell;
use crate::registry::{NodeData, TargetClass, TargetId};
use crate::schema::Validator;
use crate::target::{DependencyKind, EnvironmentSpec, dependency};
use crate::template::{self, Placeholder, Resolver, TemplateError};
use crate::util::paths::split_extension;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
  /// Raw command template.
  pub command: String,
  pub executor: TargetId,
  pub depfile: Option<String>,
  pub deptype: Option<String>,
  pub rspfile: Option<String>,
  pub rspcontent: Option<String>,
  /// Include flag format, `%s` is replaced by the include path.
  pub includefmt: String,
  pub variables: BTreeMap<String, String>,
  pub description: String,
  /// Output naming template.
  pub output: String,
}

pub(super) fn validate(engine: &Engine, data: &NodeData) -> Option<GeneratorSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);

  let command = v.string("command", true);
  let executor = v.target("executor", TargetClass::Dependency, true);
  let depfile = v.string("depfile", false);
  let deptype = v.string("deptype", false);
  let rspfile = v.string("rspfile", false);
  let rspcontent = v.string("rspcontent", false);
  let includefmt = v.string_or("includefmt", "-I '%s'");
  let variables = v.variables("variables").unwrap_or_default();
  let description = v.string_or("description", &format!("{} {{out}}", data.name.to_uppercase()));
  let output = v.string_or("output", "{filename}{kindext}");

  if !v.finish() {
    return None;
  }

  Some(GeneratorSpec {
    command: command?,
    executor: executor?,
    depfile,
    deptype,
    rspfile,
    rspcontent,
    includefmt,
    variables,
    description,
    output,
  })
}

pub(super) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  let spec = engine.generator_spec(id)?;
  engine.expand(spec.executor).await
}

/// Path of the executable behind `executor`.
pub async fn executor_path(engine: &Arc<Engine>, executor: TargetId) -> Result<PathBuf, EngineError> {
  if engine.node(executor).class() == TargetClass::External {
    return engine.external_spec(executor)?.require_path(engine, executor);
  }
  dependency::output(engine, executor).await
}

fn render(engine: &Engine, id: TargetId, template: &str, resolver: &impl Resolver) -> Result<String, EngineError> {
  template::substitute(template, resolver).map_err(|e| {
    let diagnostic = engine.node(id).diagnostic(format!("invalid template '{}': {}", template, e));
    engine.diagnostics().fatal(diagnostic)
  })
}

/// Name of the file `generator` produces from `input` for an output of `kind`.
pub fn output_name(
  engine: &Engine,
  generator: TargetId,
  input: &Path,
  kind: DependencyKind,
) -> Result<PathBuf, EngineError> {
  let spec = engine.generator_spec(generator)?;
  let (filename, ext) = split_extension(input);
  let vars = OutputVars {
    filename,
    ext,
    kindext: kind.ext(),
    input: input.to_string_lossy().into_owned(),
  };
  render(engine, generator, &spec.output, &vars).map(PathBuf::from)
}

/// Run `generator` over `inputs`, producing `output` mirrored into the build directory.
pub async fn generate(
  engine: &Arc<Engine>,
  generator: TargetId,
  inputs: &[PathBuf],
  environment: TargetId,
  output: &Path,
) -> Result<PathBuf, EngineError> {
  let spec = engine.generator_spec(generator)?;
  let env = engine.environment_spec(environment)?;

  let output = engine.builddir_path(output);
  if let Some(parent) = output.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }

  let executor = executor_path(engine, spec.executor).await?;
  let vars = CommandVars::new(&spec, &env, &executor, inputs, &output);

  let description = render(engine, generator, &spec.description, &vars)?;
  engine.report_status(&format!("Generating {}...", description));

  let cmd = render(engine, generator, &spec.command, &vars)?;
  shell::run(&cmd, &engine.options().builddir)
    .await
    .map_err(|e| engine.diagnostics().fail(e))?;

  Ok(output)
}

fn quote(path: &Path) -> String {
  format!("'{}'", path.display())
}

/// Placeholders available to command and description templates.
struct CommandVars<'a> {
  executor: String,
  inputs: String,
  output: String,
  outputdir: String,
  includes: String,
  environment: &'a EnvironmentSpec,
  generator: &'a GeneratorSpec,
}

impl<'a> CommandVars<'a> {
  fn new(
    generator: &'a GeneratorSpec,
    environment: &'a EnvironmentSpec,
    executor: &Path,
    inputs: &[PathBuf],
    output: &Path,
  ) -> Self {
    let includes = environment
      .includes
      .iter()
      .map(|include| generator.includefmt.replace("%s", &include.to_string_lossy()))
      .collect::<Vec<_>>()
      .join(" ");

    Self {
      executor: executor.display().to_string(),
      inputs: inputs.iter().map(|i| quote(i)).collect::<Vec<_>>().join(" "),
      output: quote(output),
      outputdir: quote(output.parent().unwrap_or(Path::new(""))),
      includes,
      environment,
      generator,
    }
  }

  fn variable(&self, key: &str) -> String {
    self
      .environment
      .variable(key)
      .or_else(|| self.generator.variables.get(key).map(String::as_str))
      .unwrap_or_default()
      .to_string()
  }
}

impl Resolver for CommandVars<'_> {
  fn resolve(&self, placeholder: &Placeholder) -> Result<String, TemplateError> {
    let name = placeholder.name.as_str();
    if let "env" | "environment" = name {
      return match &placeholder.attr {
        Some(key) => Ok(self.variable(key)),
        None => Err(TemplateError::Malformed(format!("{} needs a variable name", placeholder))),
      };
    }
    if placeholder.attr.is_some() {
      return Err(TemplateError::Malformed(placeholder.to_string()));
    }

    match name {
      "exe" | "executor" => Ok(self.executor.clone()),
      "in" | "input" => Ok(self.inputs.clone()),
      "out" | "output" => Ok(self.output.clone()),
      "outputdir" => Ok(self.outputdir.clone()),
      "includes" => Ok(self.includes.clone()),
      _ => Err(TemplateError::Unknown(placeholder.to_string())),
    }
  }
}

/// Placeholders available to output naming templates.
struct OutputVars {
  filename: String,
  ext: String,
  kindext: &'static str,
  input: String,
}

impl Resolver for OutputVars {
  fn resolve(&self, placeholder: &Placeholder) -> Result<String, TemplateError> {
    if placeholder.attr.is_some() {
      return Err(TemplateError::Malformed(placeholder.to_string()));
    }
    match placeholder.name.as_str() {
      "filename" => Ok(self.filename.clone()),
      "ext" => Ok(self.ext.clone()),
      "kindext" => Ok(self.kindext.to_string()),
      "input" => Ok(self.input.clone()),
      _ => Err(TemplateError::Unknown(placeholder.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::Declaration;
  use crate::util::testutil::{Toolchain, engine_at};
  use tempfile::TempDir;

  async fn prepared(command: &str) -> (TempDir, Arc<Engine>, Toolchain) {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    let toolchain = Toolchain::declare(&engine, command);
    engine.prepare_all().await.unwrap();
    (temp, engine, toolchain)
  }

  #[tokio::test]
  async fn defaults_are_applied() {
    let (_temp, engine, toolchain) = prepared("{exe} {in}").await;

    let spec = engine.generator_spec(toolchain.cc).unwrap();

    assert_eq!(spec.description, "CC {out}");
    assert_eq!(spec.output, "{filename}{kindext}");
    assert_eq!(spec.includefmt, "-I '%s'");
    assert_eq!(spec.depfile, None);
  }

  #[tokio::test]
  async fn command_is_required() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    let id = engine.declare(Declaration::new(TargetClass::Generator, "nothing")).unwrap();

    engine.prepare(id).await.unwrap();

    assert!(engine.node(id).spec().is_none());
    assert_eq!(engine.diagnostics().count(), 2);
  }

  #[tokio::test]
  async fn output_name_replaces_extension() {
    let (_temp, engine, toolchain) = prepared("{exe} {in}").await;

    let object = output_name(&engine, toolchain.cc, Path::new("/src/main.c"), DependencyKind::Object).unwrap();
    let archive = output_name(&engine, toolchain.cc, Path::new("/src/main.c"), DependencyKind::StaticLibrary).unwrap();

    assert_eq!(object, PathBuf::from("/src/main.o"));
    assert_eq!(archive, PathBuf::from("/src/main.a"));
  }

  #[test]
  fn command_placeholders_are_substituted() {
    let generator = GeneratorSpec {
      command: String::new(),
      executor: TargetId(0),
      depfile: None,
      deptype: None,
      rspfile: None,
      rspcontent: None,
      includefmt: "-I '%s'".to_string(),
      variables: BTreeMap::from([("OPT".to_string(), "-O1".to_string())]),
      description: String::new(),
      output: String::new(),
    };
    let environment = EnvironmentSpec {
      parent: None,
      systarget: "x86_64-pc-linux-gnu".to_string(),
      archiver: None,
      linker: None,
      includes: vec![PathBuf::from("/inc")],
      variables: BTreeMap::from([("CFLAGS".to_string(), "-Wall".to_string())]),
    };
    let inputs = [PathBuf::from("/src/a.c"), PathBuf::from("/src/b.c")];
    let vars = CommandVars::new(
      &generator,
      &environment,
      Path::new("/usr/bin/cc"),
      &inputs,
      Path::new("/build/app"),
    );

    let cmd = template::substitute(
      "{exe} {in} {env.CFLAGS} {environment[OPT]} {env.MISSING}{includes} -o {out} -d {outputdir}",
      &vars,
    )
    .unwrap();

    assert_eq!(
      cmd,
      "/usr/bin/cc '/src/a.c' '/src/b.c' -Wall -O1 -I '/inc' -o '/build/app' -d '/build'"
    );
    assert!(matches!(
      template::substitute("{bogus}", &vars),
      Err(TemplateError::Unknown(_))
    ));
  }

  #[tokio::test]
  async fn generate_runs_command_in_builddir() {
    let (temp, engine, toolchain) = prepared("cat {in} > {out}").await;
    engine.expand(toolchain.cc).await.unwrap();
    let input = temp.path().join("a.c");
    std::fs::write(&input, "int main;\n").unwrap();

    let output = generate(&engine, toolchain.cc, &[input], toolchain.env, &temp.path().join("obj/a.o"))
      .await
      .unwrap();

    assert_eq!(output, temp.path().join("builddir/obj/a.o"));
    assert_eq!(std::fs::read_to_string(output).unwrap(), "int main;\n");
  }

  #[tokio::test]
  async fn failing_command_is_reported() {
    let (temp, engine, toolchain) = prepared("exit 3").await;
    engine.expand(toolchain.cc).await.unwrap();

    let err = generate(&engine, toolchain.cc, &[], toolchain.env, &temp.path().join("a.o"))
      .await
      .unwrap_err();

    assert!(matches!(err, EngineError::CommandFailed { code: Some(3), .. }));
    assert_eq!(engine.diagnostics().count(), 1);
  }
}
