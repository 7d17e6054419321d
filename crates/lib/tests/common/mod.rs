#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use simba_lib::{Engine, EngineError, LuaRecipes, Options};
use tempfile::TempDir;

/// A `/bin/sh` toolchain: `.txt` files are copied into objects and linking concatenates.
pub const TOOLCHAIN: &str = r#"
sh = external {
  name = "sh",
  kind = "executable",
  provider = "system",
  external_name = "sh",
  path = "/bin/sh",
}
local copy = generator { name = "copy", command = "cat {in} > {out}", executor = sh }
local cat = generator { name = "cat", command = "cat {in} > {out}", executor = sh }
filetype { name = "txt", extensions = { ".txt" }, generator = copy }
toolchain = environment { name = "sh", linker = cat, archiver = cat }
"#;

/// Create a project directory from `(path, content)` pairs.
pub fn project(files: &[(&str, &str)]) -> TempDir {
  let temp = TempDir::new().unwrap();
  for (file, content) in files {
    let path = temp.path().join(file);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
  }
  temp
}

pub fn options(root: &Path) -> Options {
  Options {
    rootdir: root.to_path_buf(),
    builddir: root.join("builddir"),
    ..Options::default()
  }
}

/// Load the recipes of `options.rootdir`.
pub async fn load(options: Options) -> Result<(Arc<Engine>, LuaRecipes), EngineError> {
  let engine = Arc::new(Engine::new(options));
  let mut recipes = LuaRecipes::new()?;
  engine.load(&mut recipes).await?;
  Ok((engine, recipes))
}
