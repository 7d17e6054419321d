//! Conversion of Lua values into declaration fields.

use std::collections::BTreeMap;

use mlua::prelude::*;

use crate::engine::Engine;
use crate::registry::TargetId;
use crate::types::{FileGroup, Value};

/// Lua handle to a declared target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHandle {
  pub id: TargetId,
  pub name: String,
  pub qualified: String,
}

impl TargetHandle {
  pub fn new(engine: &Engine, id: TargetId) -> Self {
    let node = engine.node(id);
    let data = node.data();
    Self {
      id,
      name: data.name.clone(),
      qualified: data.qualified.clone(),
    }
  }
}

impl LuaUserData for TargetHandle {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| Ok(this.name.clone()));
    fields.add_field_method_get("qualified", |_, this| Ok(this.qualified.clone()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| Ok(this.qualified.clone()));
    methods.add_meta_method(LuaMetaMethod::Eq, |_, this, other: LuaUserDataRef<TargetHandle>| {
      Ok(this.id == other.id)
    });
  }
}

/// Lua handle to a `files(...)` group.
#[derive(Debug, Clone, PartialEq)]
pub struct FilesHandle(pub FileGroup);

impl LuaUserData for FilesHandle {
  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
      Ok(format!("files({})", this.0.dir.display()))
    });
  }
}

/// Convert a Lua value into a field value.
pub fn lua_to_value(value: LuaValue) -> LuaResult<Value> {
  match value {
    LuaValue::String(s) => Ok(Value::String(s.to_str()?.to_string())),
    LuaValue::Integer(i) => Ok(Value::Integer(i)),
    LuaValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(Value::Integer(n as i64)),
    LuaValue::Number(n) => Err(LuaError::external(format!("non-integer number {} not allowed", n))),
    LuaValue::Boolean(b) => Ok(Value::Boolean(b)),
    LuaValue::UserData(ud) => {
      if let Ok(handle) = ud.borrow::<TargetHandle>() {
        return Ok(Value::Target(handle.id));
      }
      if let Ok(files) = ud.borrow::<FilesHandle>() {
        return Ok(Value::Files(files.0.clone()));
      }
      Err(LuaError::external("unsupported userdata value"))
    }
    LuaValue::Table(t) => {
      // Check if it's an array (sequential integer keys starting at 1)
      let len = t.raw_len();
      let first: LuaValue = t.raw_get(1)?;
      if len > 0 && first != LuaValue::Nil {
        let mut items = Vec::with_capacity(len);
        for i in 1..=len {
          items.push(lua_to_value(t.raw_get(i)?)?);
        }
        Ok(Value::Array(items))
      } else {
        Ok(Value::Table(lua_to_fields(&t)?))
      }
    }
    LuaValue::Nil => Err(LuaError::external("nil values not allowed in fields")),
    other => Err(LuaError::external(format!("unsupported value type: {}", other.type_name()))),
  }
}

/// Convert a table with string keys into a field map.
pub fn lua_to_fields(table: &LuaTable) -> LuaResult<BTreeMap<String, Value>> {
  let mut fields = BTreeMap::new();
  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, value) = pair?;
    let LuaValue::String(key) = key else {
      return Err(LuaError::external(format!(
        "field names must be strings, got {}",
        key.type_name()
      )));
    };
    fields.insert(key.to_str()?.to_string(), lua_to_value(value)?);
  }
  Ok(fields)
}

/// Split a declaring call's argument into the target name and its fields.
///
/// A string declares or references a target by name. A table must carry a
/// string `name`.
pub fn declaration_args(arg: LuaValue) -> LuaResult<(String, BTreeMap<String, Value>)> {
  match arg {
    LuaValue::String(name) => Ok((name.to_str()?.to_string(), BTreeMap::new())),
    LuaValue::Table(table) => {
      let mut fields = lua_to_fields(&table)?;
      match fields.remove("name") {
        Some(Value::String(name)) => Ok((name, fields)),
        Some(_) => Err(LuaError::external("'name' must be a string")),
        None => Err(LuaError::external("declaration requires a 'name' field")),
      }
    }
    other => Err(LuaError::external(format!(
      "expected a name or a table, got {}",
      other.type_name()
    ))),
  }
}
