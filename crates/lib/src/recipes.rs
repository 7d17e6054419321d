//! Targets every run starts with.

use crate::engine::{Engine, EngineError};
use crate::registry::{Declaration, TargetClass, TargetId};

/// Declaration of a host executable, located by the finders on expansion.
pub fn external_executable(name: &str) -> Declaration {
  Declaration::new(TargetClass::External, format!("executable:{}", name))
    .field("kind", "executable")
    .field("provider", "local")
    .field("external_name", name)
}

fn declare(engine: &Engine, decl: Declaration) -> Result<TargetId, EngineError> {
  engine.declare(decl.builtin())
}

fn generator(engine: &Engine, name: &str, command: &str, executor: &str) -> Result<TargetId, EngineError> {
  let executor = declare(engine, external_executable(executor))?;
  declare(
    engine,
    Declaration::new(TargetClass::Generator, name)
      .field("command", command)
      .field("executor", executor),
  )
}

/// Declare the default toolchain, filetypes, finder and builders.
pub fn declare_builtins(engine: &Engine) -> Result<(), EngineError> {
  let archiver = generator(
    engine,
    "ar",
    "rm -f {output} && {executor} crs {output} {input}",
    "ar",
  )?;
  let linker = generator(engine, "link", "{exe} {in} -o {out}", "cc")?;
  declare(
    engine,
    Declaration::new(TargetClass::Environment, "default")
      .field("systarget", engine.options().systarget.as_str())
      .field("archiver", archiver)
      .field("linker", linker)
      .field("default", true),
  )?;

  generator(engine, "ld", "{exe} -r {env.LDFLAGS} -o {out} {in}", "ld")?;

  let filetypes = [
    ("c", vec![".c", ".cc"], ("cc", "{exe} -c {in} {env.CFLAGS} -o {out}", "cc")),
    ("cpp", vec![".cpp", ".cxx"], ("cpp", "{exe} {in} {env.CXXFLAGS} -o {out}", "cpp")),
    (
      "d",
      vec![".d"],
      ("ldmd2", "{executor} -c {in} {includes} {env.DFLAGS} -of={out}", "ldmd2"),
    ),
  ];
  for (name, extensions, (gen_name, command, executor)) in filetypes {
    let generator = generator(engine, gen_name, command, executor)?;
    declare(
      engine,
      Declaration::new(TargetClass::Filetype, name)
        .field("extensions", extensions)
        .field("generator", generator),
    )?;
  }

  declare(
    engine,
    Declaration::new(TargetClass::Finder, "default")
      .field("hook", "path")
      .field("default", true),
  )?;

  declare(
    engine,
    Declaration::new(TargetClass::Builder, "default")
      .field("hook", "direct")
      .field("default", true),
  )?;
  let ninja = declare(engine, external_executable("ninja"))?;
  declare(
    engine,
    Declaration::new(TargetClass::Builder, "ninja")
      .field("hook", "ninja")
      .field("executor", ninja),
  )?;

  Ok(())
}
