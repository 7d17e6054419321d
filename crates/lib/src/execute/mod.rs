//! Direct build execution.
//!
//! Every dependency is generated after its own dependencies, which run
//! concurrently on the tokio runtime. Each node is generated at most once per
//! run, no matter how many dependents ask for it.

pub mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::engine::{Engine, EngineError};
use crate::lifecycle::{BoxFuture, run_once};
use crate::registry::{TargetClass, TargetId};
use crate::target::{Builder, Provider, dependency, generator};

/// Runs generators directly, in dependency order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectBuilder;

#[async_trait]
impl Builder for DirectBuilder {
  async fn build(&self, engine: &Arc<Engine>, _builder: TargetId, targets: &[TargetId]) -> Result<(), EngineError> {
    // Synthesized steps are generated through their dependents. Externals and paths produce nothing.
    let roots = targets
      .iter()
      .copied()
      .filter(|id| {
        let node = engine.node(*id);
        let data = node.data();
        data.class == TargetClass::Dependency && data.is_normal()
      })
      .collect::<Vec<_>>();

    info!(targets = roots.len(), "generating targets");
    let outputs = engine.generate_all(&roots).await?;
    engine.report_status("Done");
    debug!(outputs = ?outputs, "build complete");
    Ok(())
  }
}

impl Engine {
  /// Produce the output of a target, generating its dependencies first.
  pub fn generate(self: &Arc<Self>, id: TargetId) -> BoxFuture<'_, Result<PathBuf, EngineError>> {
    Box::pin(async move {
      let node = self.node(id);
      run_once(&node.generate_cell, async {
        self.expand(id).await?;
        match node.class() {
          TargetClass::Dependency => self.generate_dependency(id).await,
          TargetClass::External => self.external_spec(id)?.require_path(self, id),
          class if class.is_path() => Ok(self.path_of(id)),
          _ => Err(self.diagnostics().fatal(node.diagnostic("can't be generated"))),
        }
      })
      .await
    })
  }

  async fn generate_dependency(self: &Arc<Self>, id: TargetId) -> Result<PathBuf, EngineError> {
    let deps = dependency::dependencies(self, id).await?;
    let inputs = self.generate_all(&deps).await?;
    let output = dependency::output(self, id).await?;

    let spec = self.dependency_spec(id)?;
    match spec.generator {
      Some(generator) if spec.provider != Provider::Local => {
        self.pool().start(id);
        let result = generator::generate(self, generator, &inputs, spec.environment, &output).await;
        self.pool().finish(id, result.is_ok());
        result
      }
      _ => Ok(output),
    }
  }

  /// Generate `ids` concurrently, returning their outputs in the same order.
  ///
  /// Every task runs to completion. A single failure is returned as is,
  /// several are grouped into [`EngineError::Multiple`].
  pub async fn generate_all(self: &Arc<Self>, ids: &[TargetId]) -> Result<Vec<PathBuf>, EngineError> {
    let mut join_set: JoinSet<(usize, Result<PathBuf, EngineError>)> = JoinSet::new();
    for (index, id) in ids.iter().copied().enumerate() {
      let engine = Arc::clone(self);
      join_set.spawn(async move { (index, engine.generate(id).await) });
    }

    let mut outputs: Vec<Option<PathBuf>> = vec![None; ids.len()];
    let mut errors = Vec::new();
    while let Some(joined) = join_set.join_next().await {
      match joined {
        Ok((index, Ok(output))) => outputs[index] = Some(output),
        Ok((index, Err(err))) => {
          error!(node = %self.node(ids[index]).qualified(), error = %err, "generation failed");
          errors.push(err);
        }
        Err(err) => errors.push(EngineError::from(err)),
      }
    }

    match errors.len() {
      0 => Ok(outputs.into_iter().flatten().collect()),
      1 => Err(errors.remove(0)),
      _ => Err(EngineError::Multiple(errors)),
    }
  }
}
