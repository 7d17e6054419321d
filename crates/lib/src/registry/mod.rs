//! Target registry.
//!
//! An arena of nodes addressed by [`TargetId`]. Declaring a qualified name a
//! second time merges into the existing slot instead of allocating a new one,
//! so every handle taken from a forward reference observes the full definition.

mod types;

pub use types::{Declaration, TargetClass, TargetId, qualified_name};

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::OnceCell;
use tracing::debug;

use crate::consts::{DEFAULT_INSTANCE_NAME, PRIVATE_FIELD_PREFIX};
use crate::diagnostics::{Diagnostic, Diagnostics, Origin};
use crate::engine::{EngineError, Phase};
use crate::target::Spec;
use crate::types::Value;

/// Mutable state of a target.
#[derive(Debug, Clone)]
pub struct NodeData {
  pub class: TargetClass,
  pub name: String,
  pub qualified: String,
  pub origin: Origin,
  pub dir: PathBuf,
  pub fields: BTreeMap<String, Value>,
  /// Later declarations may overwrite fields.
  pub overridable: bool,
  /// Typed view of `fields`, filled in by validation.
  pub spec: Option<Spec>,
}

impl NodeData {
  /// A target holding nothing but its name.
  pub fn is_forward_ref(&self) -> bool {
    self.class.allows_forward_ref() && self.fields.is_empty()
  }

  /// Synthesised and prefixed targets have a qualified name differing from their name.
  pub fn is_normal(&self) -> bool {
    self.qualified == self.name
  }

  pub fn diagnostic(&self, message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(message).target(self.qualified.clone()).at(self.origin.clone())
  }
}

/// Outcome of a lifecycle stage, failures included, recorded once per node.
pub(crate) type StageCell<T> = OnceCell<Result<T, EngineError>>;

/// A registry slot with its lifecycle state.
#[derive(Debug)]
pub struct Node {
  pub id: TargetId,
  data: Mutex<NodeData>,
  builtin: AtomicBool,
  prepared: AtomicBool,
  expanded: AtomicBool,
  pub(crate) prepare_cell: StageCell<()>,
  pub(crate) expand_cell: StageCell<()>,
  pub(crate) generate_cell: StageCell<PathBuf>,
}

impl Node {
  fn new(id: TargetId, data: NodeData, builtin: bool) -> Self {
    Self {
      id,
      data: Mutex::new(data),
      builtin: AtomicBool::new(builtin),
      prepared: AtomicBool::new(false),
      expanded: AtomicBool::new(false),
      prepare_cell: OnceCell::new(),
      expand_cell: OnceCell::new(),
      generate_cell: OnceCell::new(),
    }
  }

  /// Lock the node state. Never hold the guard across an await point.
  pub fn data(&self) -> MutexGuard<'_, NodeData> {
    self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub fn snapshot(&self) -> NodeData {
    self.data().clone()
  }

  pub fn class(&self) -> TargetClass {
    self.data().class
  }

  pub fn qualified(&self) -> String {
    self.data().qualified.clone()
  }

  pub fn spec(&self) -> Option<Spec> {
    self.data().spec.clone()
  }

  pub fn diagnostic(&self, message: impl Into<String>) -> Diagnostic {
    self.data().diagnostic(message)
  }

  pub fn is_builtin(&self) -> bool {
    self.builtin.load(Ordering::Acquire)
  }

  pub fn is_prepared(&self) -> bool {
    self.prepared.load(Ordering::Acquire)
  }

  pub fn is_expanded(&self) -> bool {
    self.expanded.load(Ordering::Acquire)
  }

  pub(crate) fn mark_prepared(&self) {
    self.prepared.store(true, Ordering::Release);
  }

  pub(crate) fn mark_expanded(&self) {
    self.expanded.store(true, Ordering::Release);
  }
}

#[derive(Debug, Default)]
struct Inner {
  nodes: Vec<Arc<Node>>,
  names: HashMap<String, TargetId>,
  defaults: HashMap<TargetClass, TargetId>,
}

#[derive(Debug, Default)]
pub struct Registry {
  inner: RwLock<Inner>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a target, or merge the declaration into the one already holding its name.
  pub fn declare(
    &self,
    mut decl: Declaration,
    dir: PathBuf,
    phase: Phase,
    diagnostics: &Diagnostics,
  ) -> Result<TargetId, EngineError> {
    let qualified = decl.qualified_name();
    let overridable = take_flag(&mut decl.fields, "override");
    let default = take_flag(&mut decl.fields, "default");
    decl.fields.remove("name");

    let existing = self.lookup(&qualified);
    let Some(id) = existing else {
      return self.create(decl, qualified, dir, phase, diagnostics, overridable, default);
    };

    let node = self.node(id);
    if node.is_expanded() {
      return Err(diagnostics.fatal(node.diagnostic("can't update an expanded object")));
    }

    let defines_fields = !decl.fields.is_empty();
    let class = {
      let mut data = node.data();
      if decl.class != TargetClass::Target {
        data.class = decl.class;
      }
      let allow_override = overridable || data.overridable;

      for (key, value) in decl.fields {
        if key.starts_with(PRIVATE_FIELD_PREFIX) {
          diagnostics.error(data.diagnostic("forbidden field").field(key).at(decl.origin.clone()));
          continue;
        }
        match data.fields.get(&key) {
          Some(current) if *current != value && !allow_override => {
            diagnostics.error(data.diagnostic("already exists (use override=true)").field(key));
          }
          _ => {
            data.fields.insert(key, value);
          }
        }
      }

      if defines_fields {
        data.origin = decl.origin;
        data.dir = decl.dir.unwrap_or(dir);
      }
      data.overridable |= overridable;
      data.class
    };

    if defines_fields && !decl.builtin {
      node.builtin.store(false, Ordering::Release);
    }
    self.register_default(id, class, &decl.name, default);

    debug!(node = %qualified, "merged declaration");
    Ok(id)
  }

  /// Return the target holding the declaration's name, creating it if needed.
  ///
  /// Unlike [`Registry::declare`] an existing target is left untouched.
  pub fn intern(
    &self,
    decl: Declaration,
    dir: PathBuf,
    phase: Phase,
    diagnostics: &Diagnostics,
  ) -> Result<TargetId, EngineError> {
    match self.lookup(&decl.qualified_name()) {
      Some(id) => Ok(id),
      None => self.declare(decl, dir, phase, diagnostics),
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn create(
    &self,
    decl: Declaration,
    qualified: String,
    dir: PathBuf,
    phase: Phase,
    diagnostics: &Diagnostics,
    overridable: bool,
    default: bool,
  ) -> Result<TargetId, EngineError> {
    let mut data = NodeData {
      class: decl.class,
      name: decl.name,
      qualified: qualified.clone(),
      origin: decl.origin,
      dir: decl.dir.unwrap_or(dir),
      fields: BTreeMap::new(),
      overridable,
      spec: None,
    };
    for (key, value) in decl.fields {
      if key.starts_with(PRIVATE_FIELD_PREFIX) {
        diagnostics.error(data.diagnostic("forbidden field").field(key));
        continue;
      }
      data.fields.insert(key, value);
    }

    if phase == Phase::Prepare {
      return Err(diagnostics.fatal(data.diagnostic("can't create object while on 'prepare' phase")));
    }

    let (id, class, name) = {
      let mut inner = self.write();
      let id = TargetId(inner.nodes.len());
      let class = data.class;
      let name = data.name.clone();
      inner.nodes.push(Arc::new(Node::new(id, data, decl.builtin)));
      inner.names.insert(qualified.clone(), id);
      (id, class, name)
    };
    self.register_default(id, class, &name, default);

    debug!(node = %qualified, id = id.0, "created target");
    Ok(id)
  }

  fn register_default(&self, id: TargetId, class: TargetClass, name: &str, explicit: bool) {
    let mut inner = self.write();
    if explicit {
      inner.defaults.insert(class, id);
    } else if name == DEFAULT_INSTANCE_NAME {
      inner.defaults.entry(class).or_insert(id);
    }
  }

  pub fn node(&self, id: TargetId) -> Arc<Node> {
    Arc::clone(&self.read().nodes[id.0])
  }

  pub fn lookup(&self, qualified: &str) -> Option<TargetId> {
    self.read().names.get(qualified).copied()
  }

  /// Every target in declaration order.
  pub fn ids(&self) -> Vec<TargetId> {
    (0..self.len()).map(TargetId).collect()
  }

  pub fn default_of(&self, class: TargetClass) -> Option<TargetId> {
    self.read().defaults.get(&class).copied()
  }

  pub fn len(&self) -> usize {
    self.read().nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
    self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
    self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

fn take_flag(fields: &mut BTreeMap<String, Value>, key: &str) -> bool {
  fields.remove(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn declare(registry: &Registry, diagnostics: &Diagnostics, decl: Declaration) -> TargetId {
    registry.declare(decl, PathBuf::from("/src"), Phase::Load, diagnostics).unwrap()
  }

  #[test]
  fn redeclaring_merges_into_the_same_slot() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let forward = declare(&registry, &diagnostics, Declaration::new(TargetClass::Target, "app"));
    assert!(registry.node(forward).data().is_forward_ref());

    let full = declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"),
    );

    assert_eq!(forward, full);
    assert_eq!(registry.len(), 1);
    let data = registry.node(forward).snapshot();
    assert_eq!(data.class, TargetClass::Dependency);
    assert!(!data.is_forward_ref());
    assert_eq!(diagnostics.count(), 0);
  }

  #[test]
  fn conflicting_field_requires_override() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"));
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("kind", "object"));

    assert_eq!(diagnostics.count(), 1);
    assert!(diagnostics.messages()[0].contains("app.kind: already exists"));
    assert_eq!(registry.node(id).data().fields["kind"], Value::from("executable"));

    declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Dependency, "app")
        .field("kind", "object")
        .field("override", true),
    );

    assert_eq!(diagnostics.count(), 1);
    assert_eq!(registry.node(id).data().fields["kind"], Value::from("object"));
  }

  #[test]
  fn identical_field_merges_silently() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"));
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"));

    assert_eq!(diagnostics.count(), 0);
  }

  #[test]
  fn private_fields_are_rejected() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app"));
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("_hidden", true));

    assert_eq!(diagnostics.count(), 1);
    assert!(diagnostics.messages()[0].contains("app._hidden: forbidden field"));
    assert!(!registry.node(id).data().fields.contains_key("_hidden"));
  }

  #[test]
  fn generic_reference_keeps_concrete_class() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "lib").field("kind", "static_library"));
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Target, "lib"));

    assert_eq!(registry.node(id).class(), TargetClass::Dependency);
  }

  #[test]
  fn default_instance_registration() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let named = declare(&registry, &diagnostics, Declaration::new(TargetClass::Environment, "default").field("systarget", "x"));
    assert_eq!(registry.default_of(TargetClass::Environment), Some(named));

    let explicit = declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Environment, "release")
        .field("systarget", "x")
        .field("default", true),
    );
    assert_eq!(registry.default_of(TargetClass::Environment), Some(explicit));
    assert!(!registry.node(explicit).data().fields.contains_key("default"));
  }

  #[test]
  fn first_default_named_instance_wins() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let explicit = declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Builder, "direct").field("hook", "direct").field("default", true),
    );
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Builder, "default").field("hook", "direct"));

    assert_eq!(registry.default_of(TargetClass::Builder), Some(explicit));
  }

  #[test]
  fn creating_during_prepare_is_fatal() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let result = registry.declare(
      Declaration::new(TargetClass::Dependency, "late"),
      PathBuf::from("/src"),
      Phase::Prepare,
      &diagnostics,
    );

    assert!(matches!(result, Err(EngineError::Fatal(_))));
    assert!(registry.is_empty());
  }

  #[test]
  fn updating_an_expanded_target_is_fatal() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"));
    registry.node(id).mark_expanded();

    let result = registry.declare(
      Declaration::new(TargetClass::Dependency, "app").field("kind", "executable"),
      PathBuf::from("/src"),
      Phase::Postload,
      &diagnostics,
    );

    assert!(matches!(result, Err(EngineError::Fatal(ref m)) if m.contains("can't update an expanded object")));
  }

  #[test]
  fn intern_returns_existing_without_merging() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(&registry, &diagnostics, Declaration::new(TargetClass::Dependency, "/src/a.o").field("kind", "object"));
    registry.node(id).mark_expanded();

    let again = registry
      .intern(
        Declaration::new(TargetClass::Dependency, "/src/a.o").field("kind", "object"),
        PathBuf::from("/src"),
        Phase::Postload,
        &diagnostics,
      )
      .unwrap();

    assert_eq!(id, again);
    assert_eq!(diagnostics.count(), 0);
  }

  #[test]
  fn builtin_flag_cleared_by_recipe_redefinition() {
    let registry = Registry::new();
    let diagnostics = Diagnostics::new();

    let id = declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Generator, "cc").field("command", "cc").builtin(),
    );
    declare(&registry, &diagnostics, Declaration::new(TargetClass::Generator, "cc"));
    assert!(registry.node(id).is_builtin());

    declare(
      &registry,
      &diagnostics,
      Declaration::new(TargetClass::Generator, "cc").field("command", "clang").field("override", true),
    );
    assert!(!registry.node(id).is_builtin());
  }
}
