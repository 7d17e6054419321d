//! Recipe globals.
//!
//! Native functions are registered here. The declaring helpers recipes call
//! (`dependency`, `executable`, `external.executable`, ...) are defined in
//! `prelude.lua` on top of the native `declare`.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use crate::diagnostics::Origin;
use crate::engine::Options;
use crate::lua::convert::{FilesHandle, TargetHandle, declaration_args, lua_to_value};
use crate::lua::runtime::{self, LoadState};
use crate::platform::system_target;
use crate::registry::{Declaration, TargetClass};
use crate::types::FileGroup;

const PRELUDE: &str = include_str!("prelude.lua");

/// Register `include`, `files`, the `simba` table and the prelude helpers.
pub fn register_globals(lua: &Lua, state: Rc<RefCell<LoadState>>) -> LuaResult<()> {
  let simba = lua.create_table()?;
  simba.set("systarget", system_target())?;
  lua.globals().set("simba", simba)?;

  let include_state = Rc::clone(&state);
  let include = lua.create_function(move |lua, path: String| {
    let engine = runtime::engine(lua)?;
    engine.diagnostics().checkpoint().map_err(LuaError::external)?;
    runtime::include(lua, &include_state, &engine, Path::new(&path))
  })?;
  lua.globals().set("include", include)?;

  let files_state = Rc::clone(&state);
  let files = lua.create_function(move |lua, sources: LuaVariadic<LuaValue>| {
    let engine = runtime::engine(lua)?;
    let dir = files_state.borrow().current_dir(&engine.options().rootdir);
    let sources = sources.iter().cloned().map(lua_to_value).collect::<LuaResult<Vec<_>>>()?;
    Ok(FilesHandle(FileGroup { dir, sources }))
  })?;
  lua.globals().set("files", files)?;

  let declare = lua.create_function(move |lua, (class, arg, line): (String, LuaValue, Option<u32>)| {
    let engine = runtime::engine(lua)?;
    let class = class.parse::<TargetClass>().map_err(LuaError::external)?;
    let (name, fields) = declaration_args(arg)?;

    let (origin, dir) = {
      let state = state.borrow();
      let rootdir = &engine.options().rootdir;
      let file = state.current_file().map(Path::to_path_buf);
      let origin = file.map(|file| Origin::new(file, line)).unwrap_or_default();
      (origin, state.current_dir(rootdir))
    };

    let decl = Declaration::new(class, name).with_fields(fields).at(origin).in_dir(dir);
    let id = engine.declare(decl).map_err(LuaError::external)?;
    Ok(TargetHandle::new(&engine, id))
  })?;

  lua.load(PRELUDE).set_name("=prelude").call::<()>(declare)?;
  Ok(())
}

/// Publish run options on the `simba` table.
pub fn set_options(lua: &Lua, options: &Options) -> LuaResult<()> {
  let simba: LuaTable = lua.globals().get("simba")?;
  simba.set("systarget", options.systarget.as_str())?;
  simba.set("rootdir", options.rootdir.to_string_lossy().to_string())?;
  simba.set("builddir", options.builddir.to_string_lossy().to_string())?;
  Ok(())
}

/// Set `simba.dir` to the directory of the recipe being loaded.
pub fn set_dir(lua: &Lua, dir: &Path) -> LuaResult<()> {
  let simba: LuaTable = lua.globals().get("simba")?;
  simba.set("dir", dir.to_string_lossy().to_string())
}
