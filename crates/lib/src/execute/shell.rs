//! Subprocess execution.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::EngineError;

/// Run `cmd` through `/bin/sh -c` in `cwd`, failing on a non-zero exit.
///
/// Returns the trimmed stdout.
pub async fn run(cmd: &str, cwd: &Path) -> Result<String, EngineError> {
  info!(cmd = %cmd, "executing command");
  debug!(working_dir = ?cwd, "spawning process");

  let output = Command::new("/bin/sh").arg("-c").arg(cmd).current_dir(cwd).output().await?;
  finish(cmd, output)
}

/// Run a program directly with `args` in `cwd`.
pub async fn run_program(program: &Path, args: &[String], cwd: &Path) -> Result<String, EngineError> {
  let cmd = std::iter::once(program.display().to_string())
    .chain(args.iter().cloned())
    .collect::<Vec<_>>()
    .join(" ");
  info!(cmd = %cmd, "executing command");

  let output = Command::new(program).args(args).current_dir(cwd).output().await?;
  finish(&cmd, output)
}

fn finish(cmd: &str, output: std::process::Output) -> Result<String, EngineError> {
  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  let stderr = String::from_utf8_lossy(&output.stderr);

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "command stderr");
  }
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }

  if !output.status.success() {
    return Err(EngineError::CommandFailed {
      cmd: cmd.to_string(),
      code: output.status.code(),
    });
  }

  Ok(stdout)
}
