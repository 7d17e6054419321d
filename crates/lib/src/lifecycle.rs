//! Per-target prepare and expand stages.
//!
//! Each stage runs behind a once-cell on the node: the first caller runs the
//! hook while concurrent callers wait for it and then observe the committed
//! state. Later calls return immediately. Unrelated targets proceed in
//! parallel.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::registry::{StageCell, TargetId};
use crate::target;

/// Boxed future returned by the recursive lifecycle entry points.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

impl Engine {
  /// Validate a target. Runs the class hook at most once.
  pub fn prepare(self: &Arc<Self>, id: TargetId) -> BoxFuture<'_, Result<(), EngineError>> {
    Box::pin(async move {
      let node = self.node(id);
      run_once(&node.prepare_cell, async {
        node.mark_prepared();
        self.report_status(&format!("Preparing '{}'...", node.qualified()));
        target::validate(self, id).await
      })
      .await
    })
  }

  /// Resolve a target, preparing it first when needed. Runs the class hook at most once.
  pub fn expand(self: &Arc<Self>, id: TargetId) -> BoxFuture<'_, Result<(), EngineError>> {
    Box::pin(async move {
      let node = self.node(id);
      run_once(&node.expand_cell, async {
        let data = node.snapshot();
        if data.is_forward_ref() {
          return Err(self.diagnostics().fatal(data.diagnostic("forward reference")));
        }

        node.mark_expanded();
        self.report_status(&format!("Expanding '{}'...", data.qualified));

        self.prepare(id).await?;
        if node.spec().is_none() {
          // Validation failed and was reported.
          self.diagnostics().checkpoint()?;
        }

        target::resolve(self, id).await?;
        self.pool().add(id);
        Ok(())
      })
      .await
    })
  }
}

/// Run `stage` the first time the cell is reached and replay its outcome afterwards.
///
/// Failures are recorded like successes, so a failing stage never runs twice.
/// The first caller gets the original error, later ones a replayed copy.
pub(crate) async fn run_once<T, F>(cell: &StageCell<T>, stage: F) -> Result<T, EngineError>
where
  T: Clone,
  F: Future<Output = Result<T, EngineError>>,
{
  let mut first_error = None;
  let slot = &mut first_error;
  let outcome = cell
    .get_or_init(|| async move {
      stage.await.map_err(|err| {
        let recorded = err.replay();
        *slot = Some(err);
        recorded
      })
    })
    .await;

  match first_error {
    Some(err) => Err(err),
    None => outcome.as_ref().cloned().map_err(EngineError::replay),
  }
}
