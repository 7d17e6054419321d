//! Toolchain environments.
//!
//! Environments form a tree through `parent`. Inherited values are copied
//! from the nearest ancestor once, when the environment is validated.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::registry::{NodeData, TargetClass, TargetId};
use crate::schema::Validator;
use crate::target::Spec;
use crate::types::{Value, ValueKind};

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentSpec {
  pub parent: Option<TargetId>,
  pub systarget: String,
  pub archiver: Option<TargetId>,
  pub linker: Option<TargetId>,
  pub includes: Vec<PathBuf>,
  pub variables: BTreeMap<String, String>,
}

impl EnvironmentSpec {
  fn root(systarget: String) -> Self {
    Self {
      parent: None,
      systarget,
      archiver: None,
      linker: None,
      includes: Vec::new(),
      variables: BTreeMap::new(),
    }
  }

  pub fn variable(&self, key: &str) -> Option<&str> {
    self.variables.get(key).map(String::as_str)
  }
}

pub(super) async fn validate(
  engine: &Arc<Engine>,
  id: TargetId,
  data: &NodeData,
) -> Result<Option<EnvironmentSpec>, EngineError> {
  let default_env = engine.registry().default_of(TargetClass::Environment);
  let is_default = default_env == Some(id);

  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let parent = v
    .target("parent", TargetClass::Environment, false)
    .or(if is_default { None } else { default_env });

  let inherited = match parent {
    Some(parent) => {
      engine.prepare(parent).await?;
      match engine.node(parent).spec() {
        Some(Spec::Environment(spec)) => spec,
        _ => EnvironmentSpec::root(engine.options().systarget.clone()),
      }
    }
    None => EnvironmentSpec::root(engine.options().systarget.clone()),
  };

  let systarget = v.string("systarget", is_default).unwrap_or(inherited.systarget);
  let archiver = v.target("archiver", TargetClass::Generator, is_default).or(inherited.archiver);
  let linker = v.target("linker", TargetClass::Generator, is_default).or(inherited.linker);

  let includes = match v.list("includes", &[ValueKind::String, ValueKind::Target(TargetClass::Path)], false) {
    Some(items) => items
      .into_iter()
      .filter_map(|item| match item {
        Value::String(s) => Some(data.dir.join(s)),
        Value::Target(folder) => Some(engine.path_of(folder)),
        _ => None,
      })
      .collect(),
    None => inherited.includes,
  };
  let variables = v.variables("variables").unwrap_or(inherited.variables);

  let spec = EnvironmentSpec {
    parent,
    systarget,
    archiver,
    linker,
    includes,
    variables,
  };
  Ok(v.finish().then_some(spec))
}
