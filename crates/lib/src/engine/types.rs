//! Types shared by the engine: options, phases and errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::consts::{DEFAULT_BUILDDIR, DEFAULT_BUILDER, DEFAULT_RECIPE_FILE};
use crate::platform::system_target;
use crate::template::TemplateError;

/// Options controlling a single engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
  /// Directory holding the root recipe.
  pub rootdir: PathBuf,
  /// Directory generated files are written to.
  pub builddir: PathBuf,
  /// Name of the builder target driving the build.
  pub builder: String,
  /// System target triple exposed to recipes.
  pub systarget: String,
  /// File name of the recipe loaded from each directory.
  pub recipe_file: String,
  /// Qualified names of the targets to build. Empty builds everything.
  pub targets: Vec<String>,
  pub verbose: bool,
  /// Expand the requested targets without generating anything.
  pub dry_run: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      rootdir: PathBuf::from("."),
      builddir: PathBuf::from(DEFAULT_BUILDDIR),
      builder: DEFAULT_BUILDER.to_string(),
      systarget: system_target(),
      recipe_file: DEFAULT_RECIPE_FILE.to_string(),
      targets: Vec::new(),
      verbose: false,
      dry_run: false,
    }
  }
}

impl Options {
  /// Make `rootdir` and `builddir` absolute against the working directory.
  pub fn normalize(mut self) -> Result<Self, EngineError> {
    let cwd = std::env::current_dir()?;
    self.rootdir = absolute(&cwd, &self.rootdir);
    self.builddir = absolute(&cwd, &self.builddir);
    Ok(self)
  }
}

fn absolute(cwd: &std::path::Path, path: &std::path::Path) -> PathBuf {
  let joined = crate::util::paths::normalize(&cwd.join(path));
  dunce::canonicalize(&joined).unwrap_or(joined)
}

/// Engine-wide phase marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
  Preload,
  Load,
  Prepare,
  Postload,
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
  /// A fatal diagnostic, already rendered.
  #[error("{0}")]
  Fatal(String),

  /// The run stopped at a checkpoint after recoverable errors.
  #[error("stopped after {0} error(s)")]
  Aborted(usize),

  /// A subprocess exited unsuccessfully.
  #[error("command \"{cmd}\" exited with {} code", render_code(.code))]
  CommandFailed { cmd: String, code: Option<i32> },

  /// Target references form a cycle through the named target.
  #[error("reference cycle detected through '{0}'")]
  CycleDetected(String),

  /// Several tasks of one group failed.
  #[error("{}", render_multiple(.0))]
  Multiple(Vec<EngineError>),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The recipe loader failed.
  #[error("recipe error: {0}")]
  Lua(String),

  #[error("template error: {0}")]
  Template(#[from] TemplateError),

  /// A spawned task panicked or was cancelled.
  #[error("task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl EngineError {
  /// Copy of this error for callers observing a failure that already happened.
  ///
  /// Variants carrying only data are reproduced as is. The rest keep their
  /// rendered message as a fatal error.
  pub fn replay(&self) -> EngineError {
    match self {
      Self::Fatal(message) => Self::Fatal(message.clone()),
      Self::Aborted(count) => Self::Aborted(*count),
      Self::CommandFailed { cmd, code } => Self::CommandFailed {
        cmd: cmd.clone(),
        code: *code,
      },
      Self::CycleDetected(name) => Self::CycleDetected(name.clone()),
      Self::Multiple(errors) => Self::Multiple(errors.iter().map(Self::replay).collect()),
      Self::Lua(message) => Self::Lua(message.clone()),
      other => Self::Fatal(other.to_string()),
    }
  }
}

fn render_code(code: &Option<i32>) -> String {
  code.map_or_else(|| "no".to_string(), |c| c.to_string())
}

fn render_multiple(errors: &[EngineError]) -> String {
  let mut out = format!("{} tasks failed", errors.len());
  for err in errors {
    out.push_str("\n  ");
    out.push_str(&err.to_string());
  }
  out
}
