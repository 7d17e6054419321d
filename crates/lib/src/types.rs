//! Field values carried by target declarations.
//!
//! Declarations are dynamically typed: a recipe may put any value in any field,
//! and the schema validator checks the shape during the prepare stage. Values
//! that point at other targets hold a [`TargetId`], so a forward reference
//! observes whatever the registry later merges into that slot.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::registry::{TargetClass, TargetId};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  String(String),
  Integer(i64),
  Boolean(bool),
  Array(Vec<Value>),
  Table(BTreeMap<String, Value>),
  Target(TargetId),
  Files(FileGroup),
}

/// A group of sources resolved against the directory it was declared in.
#[derive(Debug, Clone, PartialEq)]
pub struct FileGroup {
  pub dir: PathBuf,
  pub sources: Vec<Value>,
}

impl Value {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_target(&self) -> Option<TargetId> {
    match self {
      Value::Target(id) => Some(*id),
      _ => None,
    }
  }

  /// Visit every target referenced by this value, recursively.
  pub fn for_each_target(&self, f: &mut impl FnMut(TargetId)) {
    match self {
      Value::Target(id) => f(*id),
      Value::Array(items) => items.iter().for_each(|v| v.for_each_target(f)),
      Value::Table(map) => map.values().for_each(|v| v.for_each_target(f)),
      Value::Files(group) => group.sources.iter().for_each(|v| v.for_each_target(f)),
      Value::String(_) | Value::Integer(_) | Value::Boolean(_) => {}
    }
  }
}

/// The runtime type of a [`Value`], as named by schema checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  String,
  Integer,
  Boolean,
  Array,
  Table,
  Target(TargetClass),
  Files,
}

impl fmt::Display for ValueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValueKind::String => write!(f, "string"),
      ValueKind::Integer => write!(f, "integer"),
      ValueKind::Boolean => write!(f, "boolean"),
      ValueKind::Array => write!(f, "array"),
      ValueKind::Table => write!(f, "table"),
      ValueKind::Target(class) => write!(f, "{}", class),
      ValueKind::Files => write!(f, "files"),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Integer(i)
  }
}

impl From<TargetId> for Value {
  fn from(id: TargetId) -> Self {
    Value::Target(id)
  }
}

impl From<FileGroup> for Value {
  fn from(group: FileGroup) -> Self {
    Value::Files(group)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::Array(items.into_iter().map(Into::into).collect())
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(map: BTreeMap<String, Value>) -> Self {
    Value::Table(map)
  }
}
