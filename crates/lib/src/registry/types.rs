//! Target identity types: handles, classes and declarations.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::diagnostics::Origin;
use crate::types::Value;

/// Stable handle to a registry slot.
///
/// Handles are never invalidated: merging a declaration into an existing
/// target mutates the slot in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub usize);

impl fmt::Display for TargetId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetClass {
  Target,
  Path,
  File,
  Folder,
  Environment,
  Dependency,
  Project,
  Generator,
  Filetype,
  Finder,
  Alias,
  Builder,
  External,
}

impl TargetClass {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Target => "target",
      Self::Path => "path",
      Self::File => "file",
      Self::Folder => "folder",
      Self::Environment => "environment",
      Self::Dependency => "dependency",
      Self::Project => "project",
      Self::Generator => "generator",
      Self::Filetype => "filetype",
      Self::Finder => "finder",
      Self::Alias => "alias",
      Self::Builder => "builder",
      Self::External => "external",
    }
  }

  /// Whether a target of this class can stand where `other` is expected.
  pub fn is_a(&self, other: TargetClass) -> bool {
    *self == other
      || other == Self::Target
      || (other == Self::Path && matches!(self, Self::File | Self::Folder))
      || (other == Self::Dependency && *self == Self::External)
  }

  /// Classes whose qualified name carries the class as a prefix.
  pub fn is_prefixed(&self) -> bool {
    !matches!(self, Self::Target | Self::Dependency | Self::Alias)
  }

  /// Path-like targets are complete with just a name.
  pub fn allows_forward_ref(&self) -> bool {
    !matches!(self, Self::Path | Self::File | Self::Folder)
  }

  pub fn is_path(&self) -> bool {
    matches!(self, Self::Path | Self::File | Self::Folder)
  }
}

impl fmt::Display for TargetClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TargetClass {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "target" => Self::Target,
      "path" => Self::Path,
      "file" => Self::File,
      "folder" => Self::Folder,
      "environment" => Self::Environment,
      "dependency" => Self::Dependency,
      "project" => Self::Project,
      "generator" => Self::Generator,
      "filetype" => Self::Filetype,
      "finder" => Self::Finder,
      "alias" => Self::Alias,
      "builder" => Self::Builder,
      "external" => Self::External,
      other => return Err(format!("unknown target class '{}'", other)),
    })
  }
}

/// Name under which a target is registered.
pub fn qualified_name(class: TargetClass, name: &str, fields: &BTreeMap<String, Value>) -> String {
  match class {
    TargetClass::External => {
      let kind = fields.get("kind").and_then(Value::as_str).unwrap_or("unknown");
      let external_name = fields.get("external_name").and_then(Value::as_str).unwrap_or(name);
      format!("external.{}::{}", kind, external_name)
    }
    class if class.is_prefixed() => format!("{}::{}", class, name),
    _ => name.to_string(),
  }
}

/// A request to create a target or merge into an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
  pub class: TargetClass,
  pub name: String,
  pub fields: BTreeMap<String, Value>,
  pub origin: Origin,
  /// Directory relative paths and globs resolve against.
  pub dir: Option<PathBuf>,
  /// Declared by the engine rather than a recipe.
  pub builtin: bool,
}

impl Declaration {
  pub fn new(class: TargetClass, name: impl Into<String>) -> Self {
    Self {
      class,
      name: name.into(),
      fields: BTreeMap::new(),
      origin: Origin::default(),
      dir: None,
      builtin: false,
    }
  }

  pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(key.into(), value.into());
    self
  }

  pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
    self.fields.extend(fields);
    self
  }

  pub fn at(mut self, origin: Origin) -> Self {
    self.origin = origin;
    self
  }

  pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.dir = Some(dir.into());
    self
  }

  pub fn builtin(mut self) -> Self {
    self.builtin = true;
    self
  }

  pub fn qualified_name(&self) -> String {
    qualified_name(self.class, &self.name, &self.fields)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefixed_classes_namespace_their_names() {
    assert_eq!(Declaration::new(TargetClass::Generator, "cc").qualified_name(), "generator::cc");
    assert_eq!(Declaration::new(TargetClass::Dependency, "app").qualified_name(), "app");
    assert_eq!(Declaration::new(TargetClass::Alias, "all").qualified_name(), "all");
  }

  #[test]
  fn externals_are_keyed_by_kind_and_external_name() {
    let decl = Declaration::new(TargetClass::External, "executable:cc")
      .field("kind", "executable")
      .field("external_name", "cc");
    assert_eq!(decl.qualified_name(), "external.executable::cc");
  }

  #[test]
  fn class_hierarchy() {
    assert!(TargetClass::File.is_a(TargetClass::Path));
    assert!(TargetClass::External.is_a(TargetClass::Dependency));
    assert!(TargetClass::Generator.is_a(TargetClass::Target));
    assert!(!TargetClass::Dependency.is_a(TargetClass::External));
    assert!(!TargetClass::Path.is_a(TargetClass::File));
  }

  #[test]
  fn class_round_trips_through_its_name() {
    for class in [TargetClass::Finder, TargetClass::External, TargetClass::Folder] {
      assert_eq!(class.as_str().parse::<TargetClass>(), Ok(class));
    }
    assert!("widget".parse::<TargetClass>().is_err());
  }
}
