use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::consts::DEFAULT_RECIPE_FILE;
use crate::engine::Engine;
use crate::lua::globals;
use crate::util::paths::normalize;

/// Files being loaded, innermost last, and every file loaded so far.
#[derive(Debug)]
pub struct LoadState {
  pub stack: Vec<PathBuf>,
  pub visited: HashSet<PathBuf>,
  pub recipe_file: String,
}

impl Default for LoadState {
  fn default() -> Self {
    Self {
      stack: Vec::new(),
      visited: HashSet::new(),
      recipe_file: DEFAULT_RECIPE_FILE.to_string(),
    }
  }
}

impl LoadState {
  pub fn current_file(&self) -> Option<&Path> {
    self.stack.last().map(PathBuf::as_path)
  }

  /// Directory relative paths of the current file resolve against.
  pub fn current_dir(&self, rootdir: &Path) -> PathBuf {
    self
      .current_file()
      .and_then(Path::parent)
      .map(Path::to_path_buf)
      .unwrap_or_else(|| rootdir.to_path_buf())
  }
}

/// Create a Lua runtime with the recipe globals registered.
pub fn create_runtime(state: Rc<RefCell<LoadState>>) -> LuaResult<Lua> {
  let lua = Lua::new();
  globals::register_globals(&lua, state)?;
  Ok(lua)
}

/// Engine attached to the runtime for the current load.
pub fn engine(lua: &Lua) -> LuaResult<Arc<Engine>> {
  lua
    .app_data_ref::<Arc<Engine>>()
    .map(|engine| Arc::clone(&*engine))
    .ok_or_else(|| LuaError::external("no engine attached to the recipe runtime"))
}

/// Load a recipe file once.
///
/// Relative paths resolve against the directory of the including file, and a
/// directory loads the recipe file inside it.
pub fn include(lua: &Lua, state: &Rc<RefCell<LoadState>>, engine: &Engine, path: &Path) -> LuaResult<()> {
  let path = {
    let state = state.borrow();
    let mut path = normalize(&state.current_dir(&engine.options().rootdir).join(path));
    if path.is_dir() {
      path.push(&state.recipe_file);
    }
    path
  };

  if !state.borrow_mut().visited.insert(path.clone()) {
    debug!(recipe = %path.display(), "already loaded");
    return Ok(());
  }

  let content = std::fs::read_to_string(&path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", path.display(), e)))?;
  info!(recipe = %path.display(), "loading recipe");

  let dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
  state.borrow_mut().stack.push(path.clone());
  globals::set_dir(lua, &dir)?;

  let result = lua.load(&content).set_name(format!("@{}", path.display())).exec();

  let parent_dir = {
    let mut state = state.borrow_mut();
    state.stack.pop();
    state.current_dir(&engine.options().rootdir)
  };
  globals::set_dir(lua, &parent_dir)?;

  result
}
