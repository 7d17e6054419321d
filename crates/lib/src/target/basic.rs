//! Generic targets, aliases, paths and projects.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::engine::Engine;
use crate::registry::{NodeData, TargetClass, TargetId};
use crate::schema::Validator;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSpec {
  pub license: Option<TargetId>,
  pub description: Option<String>,
  pub metadata: BTreeMap<String, Value>,
}

/// Generic targets and aliases carry no fields of their own.
pub(super) fn validate_plain(engine: &Engine, data: &NodeData) -> bool {
  Validator::new(engine.registry(), engine.diagnostics(), data).finish()
}

pub(super) fn validate_path(engine: &Engine, id: TargetId, data: &NodeData) -> Option<PathBuf> {
  let ok = Validator::new(engine.registry(), engine.diagnostics(), data).finish();
  ok.then(|| engine.path_of(id))
}

pub(super) fn validate_project(engine: &Engine, data: &NodeData) -> Option<ProjectSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let spec = ProjectSpec {
    license: v.target("license", TargetClass::File, false),
    description: v.string("description", false),
    metadata: v.table("metadata").unwrap_or_default(),
  };
  v.finish().then_some(spec)
}
