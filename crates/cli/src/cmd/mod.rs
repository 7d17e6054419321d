mod build;
mod check;
mod tree;

pub use build::cmd_build;
pub use check::cmd_check;
pub use tree::cmd_tree;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::debug;

use simba_lib::{Engine, LuaRecipes, Options};

/// Load the recipes of `options.rootdir` into a fresh engine.
fn load(options: Options) -> Result<(Runtime, Arc<Engine>)> {
  let options = options.normalize().context("Failed to resolve directories")?;
  debug!(rootdir = %options.rootdir.display(), builddir = %options.builddir.display(), "options");

  let runtime = Runtime::new().context("Failed to create async runtime")?;
  let engine = Arc::new(Engine::new(options));
  let mut recipes = LuaRecipes::new()?;
  runtime.block_on(engine.load(&mut recipes))?;

  Ok((runtime, engine))
}
