//! Fixtures shared by unit tests.

use std::path::Path;
use std::sync::Arc;

use crate::engine::{Engine, Options, Phase};
use crate::registry::{Declaration, TargetClass, TargetId};

/// Engine rooted at `root`, ready to accept declarations.
pub fn engine_at(root: &Path) -> Arc<Engine> {
  let engine = Engine::new(Options {
    rootdir: root.to_path_buf(),
    builddir: root.join("builddir"),
    systarget: "x86_64-pc-linux-gnu".to_string(),
    ..Options::default()
  });
  engine.set_phase(Phase::Load);
  Arc::new(engine)
}

/// Create empty files, including parent directories.
pub fn write_files(dir: &Path, files: &[&str]) {
  for file in files {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, format!("{}\n", file)).unwrap();
  }
}

/// A `/bin/sh` toolchain with a `c` filetype and a default environment.
pub struct Toolchain {
  pub sh: TargetId,
  pub cc: TargetId,
  pub link: TargetId,
  pub ar: TargetId,
  pub env: TargetId,
  pub filetype: TargetId,
}

impl Toolchain {
  /// Declare the toolchain. `compile` is the command of the `cc` generator.
  pub fn declare(engine: &Engine, compile: &str) -> Self {
    let sh = engine
      .declare(
        Declaration::new(TargetClass::External, "sh")
          .field("kind", "executable")
          .field("provider", "system")
          .field("external_name", "sh")
          .field("path", "/bin/sh"),
      )
      .unwrap();

    let generator = |name: &str, command: &str| {
      engine
        .declare(
          Declaration::new(TargetClass::Generator, name)
            .field("command", command)
            .field("executor", sh),
        )
        .unwrap()
    };
    let cc = generator("cc", compile);
    let link = generator("link", "cat {in} > {out}");
    let ar = generator("ar", "cat {in} > {out}");

    let env = engine
      .declare(
        Declaration::new(TargetClass::Environment, "default")
          .field("systarget", "x86_64-pc-linux-gnu")
          .field("archiver", ar)
          .field("linker", link),
      )
      .unwrap();
    let filetype = engine
      .declare(
        Declaration::new(TargetClass::Filetype, "c")
          .field("extensions", vec![".c"])
          .field("generator", cc),
      )
      .unwrap();

    Self {
      sh,
      cc,
      link,
      ar,
      env,
      filetype,
    }
  }
}
