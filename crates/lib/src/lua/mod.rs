//! Lua recipe loading.
//!
//! Recipes are Lua files declaring targets through global functions. Each file
//! is evaluated with its own directory as the base for relative names, sources
//! and nested `include` calls.
//!
//! ```lua
//! local cflags = environment { name = "release", variables = { CFLAGS = "-O2" } }
//!
//! executable {
//!   name = "app",
//!   sources = files("src/*.c"),
//!   environment = cflags,
//! }
//!
//! include "tests"
//! ```

pub mod convert;
pub mod globals;
pub mod runtime;

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use mlua::prelude::*;

use crate::engine::{Engine, EngineError, RecipeLoader};
use runtime::LoadState;

/// Loads recipes with an embedded Lua 5.4 runtime.
pub struct LuaRecipes {
  lua: Lua,
  state: Rc<RefCell<LoadState>>,
}

impl fmt::Debug for LuaRecipes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LuaRecipes").finish_non_exhaustive()
  }
}

impl LuaRecipes {
  pub fn new() -> Result<Self, EngineError> {
    let state = Rc::new(RefCell::new(LoadState::default()));
    let lua = runtime::create_runtime(Rc::clone(&state)).map_err(into_engine_error)?;
    Ok(Self { lua, state })
  }

  pub fn lua(&self) -> &Lua {
    &self.lua
  }
}

impl RecipeLoader for LuaRecipes {
  fn include(&mut self, engine: &Arc<Engine>, path: &Path) -> Result<(), EngineError> {
    self.lua.set_app_data(Arc::clone(engine));
    self.state.borrow_mut().recipe_file = engine.options().recipe_file.clone();
    globals::set_options(&self.lua, engine.options()).map_err(into_engine_error)?;

    runtime::include(&self.lua, &self.state, engine, path).map_err(into_engine_error)
  }
}

/// Recover engine failures raised inside callbacks so that aborts and fatal
/// diagnostics keep their meaning across the Lua boundary.
fn into_engine_error(err: LuaError) -> EngineError {
  match engine_cause(&err) {
    Some(EngineError::Aborted(count)) => EngineError::Aborted(*count),
    Some(EngineError::Fatal(message)) => EngineError::Fatal(message.clone()),
    _ => EngineError::Lua(err.to_string()),
  }
}

fn engine_cause(err: &LuaError) -> Option<&EngineError> {
  match err {
    LuaError::ExternalError(cause) => cause.downcast_ref::<EngineError>(),
    LuaError::CallbackError { cause, .. } => engine_cause(cause),
    LuaError::WithContext { cause, .. } => engine_cause(cause),
    _ => None,
  }
}
