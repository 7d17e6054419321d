//! Implementation of the `simba build` command.
//!
//! Loads the recipes and hands the requested targets to the configured
//! builder. With `--dry-run` the targets are only expanded.

use std::time::Instant;

use anyhow::{Context, Result};

use crate::output::{format_duration, print_info, print_success};
use simba_lib::Options;

pub fn cmd_build(options: Options) -> Result<()> {
  let start = Instant::now();
  let dry_run = options.dry_run;
  let (runtime, engine) = super::load(options)?;

  runtime.block_on(engine.build()).context("Build failed")?;

  if dry_run {
    let progress = engine.pool().progress();
    print_info(&format!("Dry run: {} target(s) skipped", progress.skipped));
  } else {
    print_success(&format!("Build complete in {}", format_duration(start.elapsed())));
  }
  Ok(())
}
