//! Declarative field validation for the prepare stage.
//!
//! A [`Validator`] is scoped to one target. Each `field` call declares a
//! field, checks its type and applies its default. [`Validator::finish`]
//! reports every field nobody declared. Problems are recorded in the
//! diagnostics sink so a single pass reports all of them.

use std::collections::BTreeMap;

use crate::consts::PRIVATE_FIELD_PREFIX;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::registry::{NodeData, Registry, TargetClass, TargetId};
use crate::types::{Value, ValueKind};

pub struct Validator<'a> {
  registry: &'a Registry,
  diagnostics: &'a Diagnostics,
  data: &'a NodeData,
  declared: Vec<&'static str>,
  ok: bool,
}

impl<'a> Validator<'a> {
  pub fn new(registry: &'a Registry, diagnostics: &'a Diagnostics, data: &'a NodeData) -> Self {
    Self {
      registry,
      diagnostics,
      data,
      declared: vec!["name", "expanded"],
      ok: true,
    }
  }

  /// Runtime type of a value, resolving target handles to their class.
  pub fn kind_of(&self, value: &Value) -> ValueKind {
    match value {
      Value::String(_) => ValueKind::String,
      Value::Integer(_) => ValueKind::Integer,
      Value::Boolean(_) => ValueKind::Boolean,
      Value::Array(_) => ValueKind::Array,
      Value::Table(_) => ValueKind::Table,
      Value::Files(_) => ValueKind::Files,
      Value::Target(id) => ValueKind::Target(self.registry.node(*id).class()),
    }
  }

  fn matches(&self, value: &Value, kinds: &[ValueKind]) -> bool {
    let actual = self.kind_of(value);
    kinds.iter().any(|expected| match (expected, actual) {
      (ValueKind::Target(want), ValueKind::Target(have)) => have.is_a(*want),
      (expected, actual) => *expected == actual,
    })
  }

  /// Declare `name`, returning its value or `default` when absent.
  pub fn field(
    &mut self,
    name: &'static str,
    kinds: &[ValueKind],
    required: bool,
    default: Option<Value>,
  ) -> Option<Value> {
    self.declared.push(name);

    let Some(value) = self.data.fields.get(name) else {
      if required {
        self.report(self.data.diagnostic("field is required").field(name));
      }
      return default;
    };

    if !self.matches(value, kinds) {
      self.mismatch(name, kinds, value);
      return default;
    }

    Some(value.clone())
  }

  fn mismatch(&mut self, name: &str, kinds: &[ValueKind], value: &Value) {
    let expected = kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    let message = format!(
      "field '{}({})' expected types [{}], but got {}",
      self.data.qualified,
      name,
      expected,
      self.kind_of(value)
    );
    self.report(Diagnostic::new(message).at(self.data.origin.clone()));
  }

  pub fn string(&mut self, name: &'static str, required: bool) -> Option<String> {
    self
      .field(name, &[ValueKind::String], required, None)
      .and_then(|v| v.as_str().map(str::to_string))
  }

  pub fn string_or(&mut self, name: &'static str, default: &str) -> String {
    self.string(name, false).unwrap_or_else(|| default.to_string())
  }

  pub fn boolean(&mut self, name: &'static str, default: bool) -> bool {
    self
      .field(name, &[ValueKind::Boolean], false, None)
      .and_then(|v| v.as_bool())
      .unwrap_or(default)
  }

  pub fn target(&mut self, name: &'static str, class: TargetClass, required: bool) -> Option<TargetId> {
    self
      .field(name, &[ValueKind::Target(class)], required, None)
      .and_then(|v| v.as_target())
  }

  /// A list whose items match `item_kinds`. A single matching item is accepted
  /// as a list of one. Mismatching items are reported and dropped.
  pub fn list(&mut self, name: &'static str, item_kinds: &[ValueKind], required: bool) -> Option<Vec<Value>> {
    let mut kinds = vec![ValueKind::Array];
    kinds.extend_from_slice(item_kinds);

    match self.field(name, &kinds, required, None)? {
      Value::Array(items) => Some(
        items
          .into_iter()
          .filter(|item| {
            let ok = self.matches(item, item_kinds);
            if !ok {
              self.mismatch(name, item_kinds, item);
            }
            ok
          })
          .collect(),
      ),
      single => Some(vec![single]),
    }
  }

  /// A list of targets of `class`.
  pub fn targets(&mut self, name: &'static str, class: TargetClass) -> Vec<TargetId> {
    self
      .list(name, &[ValueKind::Target(class)], false)
      .unwrap_or_default()
      .iter()
      .filter_map(Value::as_target)
      .collect()
  }

  /// A list of strings.
  pub fn strings(&mut self, name: &'static str, required: bool) -> Option<Vec<String>> {
    self
      .list(name, &[ValueKind::String], required)
      .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
  }

  /// A table of scalar values rendered as strings.
  pub fn variables(&mut self, name: &'static str) -> Option<BTreeMap<String, String>> {
    let Value::Table(table) = self.field(name, &[ValueKind::Table], false, None)? else {
      return None;
    };

    let mut out = BTreeMap::new();
    for (key, value) in table {
      match value {
        Value::String(s) => {
          out.insert(key, s);
        }
        Value::Integer(i) => {
          out.insert(key, i.to_string());
        }
        Value::Boolean(b) => {
          out.insert(key, b.to_string());
        }
        other => self.mismatch(name, &[ValueKind::String, ValueKind::Integer, ValueKind::Boolean], &other),
      }
    }
    Some(out)
  }

  pub fn table(&mut self, name: &'static str) -> Option<BTreeMap<String, Value>> {
    match self.field(name, &[ValueKind::Table], false, None)? {
      Value::Table(table) => Some(table),
      _ => None,
    }
  }

  /// Report a custom problem on `field`.
  pub fn error(&mut self, field: &str, message: impl Into<String>) {
    self.report(self.data.diagnostic(message).field(field));
  }

  fn report(&mut self, diagnostic: Diagnostic) {
    self.ok = false;
    self.diagnostics.error(diagnostic);
  }

  /// Report undeclared fields. Returns whether the target validated cleanly.
  pub fn finish(mut self) -> bool {
    let unknown: Vec<String> = self
      .data
      .fields
      .keys()
      .filter(|key| !key.starts_with(PRIVATE_FIELD_PREFIX) && !self.declared.iter().any(|d| *d == key.as_str()))
      .cloned()
      .collect();

    for key in unknown {
      let message = format!("unrecognized field '{}.{}'", self.data.qualified, key);
      self.report(Diagnostic::new(message).at(self.data.origin.clone()));
    }

    self.ok
  }
}
