//! Target classes: validation and resolution hooks.
//!
//! Validation turns a target's dynamic field bag into a typed [`Spec`].
//! Resolution performs the expensive work a build needs: locating externals,
//! picking generators and expanding referenced targets.

mod basic;
pub(crate) mod builder;
pub mod dependency;
mod environment;
pub(crate) mod external;
mod filetype;
pub(crate) mod generator;

pub use basic::ProjectSpec;
pub use builder::{Builder, BuilderSpec};
pub use dependency::{DependencyKind, DependencySpec, Provider};
pub use environment::EnvironmentSpec;
pub use external::{ExternalQuery, ExternalSpec, Finder, FinderSpec, PathFinder};
pub use filetype::FiletypeSpec;
pub use generator::GeneratorSpec;

use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::registry::{TargetClass, TargetId};

/// Typed view of a validated target.
#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
  Target,
  Alias,
  Path(PathBuf),
  Environment(EnvironmentSpec),
  Dependency(DependencySpec),
  Project(ProjectSpec),
  Generator(GeneratorSpec),
  Filetype(FiletypeSpec),
  Finder(FinderSpec),
  Builder(BuilderSpec),
  External(ExternalSpec),
}

/// Run the validation hook of the target's class.
pub(crate) async fn validate(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  let node = engine.node(id);
  let data = node.snapshot();

  let spec = match data.class {
    TargetClass::Target => basic::validate_plain(engine, &data).then_some(Spec::Target),
    TargetClass::Alias => basic::validate_plain(engine, &data).then_some(Spec::Alias),
    TargetClass::Path | TargetClass::File | TargetClass::Folder => basic::validate_path(engine, id, &data).map(Spec::Path),
    TargetClass::Project => basic::validate_project(engine, &data).map(Spec::Project),
    TargetClass::Environment => environment::validate(engine, id, &data).await?.map(Spec::Environment),
    TargetClass::Dependency => dependency::validate(engine, &data)?.map(Spec::Dependency),
    TargetClass::Generator => generator::validate(engine, &data).map(Spec::Generator),
    TargetClass::Filetype => filetype::validate(engine, id, &data).map(Spec::Filetype),
    TargetClass::Finder => external::validate_finder(engine, id, &data).map(Spec::Finder),
    TargetClass::Builder => builder::validate(engine, &data).map(Spec::Builder),
    TargetClass::External => external::validate(engine, &data).map(Spec::External),
  };

  if let Some(spec) = spec {
    node.data().spec = Some(spec);
  }
  Ok(())
}

/// Run the resolution hook of the target's class.
pub(crate) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  match engine.node(id).class() {
    TargetClass::Dependency => dependency::resolve(engine, id).await,
    TargetClass::Generator => generator::resolve(engine, id).await,
    TargetClass::Filetype => filetype::resolve(engine, id).await,
    TargetClass::Builder => builder::resolve(engine, id).await,
    TargetClass::External => external::resolve(engine, id).await,
    _ => Ok(()),
  }
}

macro_rules! spec_accessor {
  ($fn_name:ident, $variant:ident, $ty:ty, $what:literal) => {
    #[doc = concat!("Validated ", $what, " spec of a target.")]
    pub fn $fn_name(&self, id: TargetId) -> Result<$ty, EngineError> {
      let node = self.node(id);
      let data = node.data();
      match &data.spec {
        Some(Spec::$variant(spec)) => Ok(spec.clone()),
        _ => Err(self.diagnostics().fatal(data.diagnostic(concat!("is not a valid ", $what)))),
      }
    }
  };
}

impl Engine {
  spec_accessor!(environment_spec, Environment, EnvironmentSpec, "environment");
  spec_accessor!(dependency_spec, Dependency, DependencySpec, "dependency");
  spec_accessor!(generator_spec, Generator, GeneratorSpec, "generator");
  spec_accessor!(filetype_spec, Filetype, FiletypeSpec, "filetype");
  spec_accessor!(finder_spec, Finder, FinderSpec, "finder");
  spec_accessor!(builder_spec, Builder, BuilderSpec, "builder");
  spec_accessor!(external_spec, External, ExternalSpec, "external");

  /// Replace the spec of a target after resolution filled in missing values.
  pub(crate) fn update_spec(&self, id: TargetId, spec: Spec) {
    self.node(id).data().spec = Some(spec);
  }
}
