//! Error accounting for a single engine run.
//!
//! Recoverable problems (schema violations, merge conflicts, unresolved
//! externals) are recorded here and the run continues until the next
//! [`Diagnostics::checkpoint`]. Fatal problems are recorded the same way and
//! handed back as an [`EngineError`] for the caller to propagate.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::error;

use crate::engine::EngineError;

/// Where a declaration came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
  pub file: Option<PathBuf>,
  pub line: Option<u32>,
}

impl Origin {
  pub fn new(file: impl Into<PathBuf>, line: Option<u32>) -> Self {
    Self {
      file: Some(file.into()),
      line,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub origin: Origin,
  pub target: Option<String>,
  pub field: Option<String>,
  pub message: String,
}

impl Diagnostic {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      origin: Origin::default(),
      target: None,
      field: None,
      message: message.into(),
    }
  }

  pub fn target(mut self, target: impl Into<String>) -> Self {
    self.target = Some(target.into());
    self
  }

  pub fn field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }

  pub fn at(mut self, origin: Origin) -> Self {
    self.origin = origin;
    self
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Error")?;
    if let Some(file) = &self.origin.file {
      write!(f, " in {}", file.display())?;
      if let Some(line) = self.origin.line {
        write!(f, " at {}", line)?;
      }
    }
    write!(f, ": ")?;
    match (&self.target, &self.field) {
      (Some(target), Some(field)) => write!(f, "{}.{}: ", target, field)?,
      (Some(target), None) => write!(f, "{}: ", target)?,
      (None, Some(field)) => write!(f, "{}: ", field)?,
      (None, None) => {}
    }
    write!(f, "{}", self.message)
  }
}

/// Sink collecting every error reported during a run.
#[derive(Debug, Default)]
pub struct Diagnostics {
  entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a recoverable error.
  pub fn error(&self, diagnostic: Diagnostic) {
    error!("{}", diagnostic);
    self.lock().push(diagnostic);
  }

  /// Record an error that stops the run, returning it for propagation.
  pub fn fatal(&self, diagnostic: Diagnostic) -> EngineError {
    let message = diagnostic.to_string();
    self.error(diagnostic);
    EngineError::Fatal(message)
  }

  /// Record a fatal error that did not come from a declaration.
  pub fn fail(&self, err: EngineError) -> EngineError {
    error!("{}", err);
    self.lock().push(Diagnostic::new(err.to_string()));
    err
  }

  /// Fail when any error has been recorded so far.
  pub fn checkpoint(&self) -> Result<(), EngineError> {
    match self.count() {
      0 => Ok(()),
      n => Err(EngineError::Aborted(n)),
    }
  }

  pub fn count(&self) -> usize {
    self.lock().len()
  }

  /// Rendered messages in the order they were reported.
  pub fn messages(&self) -> Vec<String> {
    self.lock().iter().map(ToString::to_string).collect()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
    // A panic while holding the lock leaves the list intact.
    self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}
