//! Builders drive a build of the working set.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::engine::{Engine, EngineError};
use crate::registry::{NodeData, TargetClass, TargetId};
use crate::schema::Validator;

/// A build strategy a `builder` target names through its `hook` field.
#[async_trait]
pub trait Builder: Send + Sync {
  async fn build(&self, engine: &Arc<Engine>, builder: TargetId, targets: &[TargetId]) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSpec {
  pub executor: Option<TargetId>,
  pub hook: Option<String>,
}

pub(super) fn validate(engine: &Engine, data: &NodeData) -> Option<BuilderSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let executor = v.target("executor", TargetClass::External, false);
  let hook = v.string("hook", false);
  if let Some(hook) = &hook
    && engine.builder_hook(hook).is_none()
  {
    v.error("hook", format!("unknown builder hook '{}'", hook));
  }

  v.finish().then_some(BuilderSpec { executor, hook })
}

pub(super) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  match engine.builder_spec(id)?.executor {
    Some(executor) => engine.expand(executor).await,
    None => Ok(()),
  }
}

/// Expand `builder` and run its hook over `targets`. A dry run only expands them.
pub async fn build(engine: &Arc<Engine>, builder: TargetId, targets: &[TargetId]) -> Result<(), EngineError> {
  engine.expand(builder).await?;
  let qualified = engine.node(builder).qualified();

  if engine.options().dry_run {
    info!(builder = %qualified, targets = targets.len(), "dry run");
    for target in targets {
      engine.expand(*target).await?;
      engine.pool().skip(*target);
    }
    return Ok(());
  }

  let spec = engine.builder_spec(builder)?;
  let Some(hook) = spec.hook.as_deref().and_then(|hook| engine.builder_hook(hook)) else {
    return Err(engine.diagnostics().fatal(engine.node(builder).diagnostic("has no build hook")));
  };

  info!(builder = %qualified, targets = targets.len(), "building");
  hook.build(engine, builder, targets).await
}
