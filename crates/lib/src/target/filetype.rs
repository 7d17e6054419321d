//! Filetypes map source extensions onto generators.

use std::sync::Arc;

use crate::engine::{Engine, EngineError};
use crate::registry::{NodeData, TargetClass, TargetId};
use crate::schema::Validator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiletypeSpec {
  /// Extensions with their leading dot.
  pub extensions: Vec<String>,
  pub generator: TargetId,
}

pub(super) fn validate(engine: &Engine, id: TargetId, data: &NodeData) -> Option<FiletypeSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let extensions = v.strings("extensions", true);
  let generator = v.target("generator", TargetClass::Generator, true);
  if !v.finish() {
    return None;
  }

  let generator = generator?;
  let extensions = extensions?
    .into_iter()
    .map(|ext| if ext.starts_with('.') { ext } else { format!(".{}", ext) })
    .collect::<Vec<_>>();

  let mut ok = true;
  for ext in &extensions {
    if let Some(owner) = engine.register_extension(ext, id) {
      let message = format!("target '{}' already registers '{}'", engine.node(owner).qualified(), ext);
      engine.diagnostics().error(data.diagnostic(message));
      ok = false;
    }
  }

  ok.then_some(FiletypeSpec { extensions, generator })
}

pub(super) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  let spec = engine.filetype_spec(id)?;
  engine.expand(spec.generator).await
}
