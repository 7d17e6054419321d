use anyhow::{Context, Result};

use crate::output::print_success;
use simba_lib::Options;

pub fn cmd_check(options: Options) -> Result<()> {
  let (runtime, engine) = super::load(options)?;
  runtime.block_on(engine.check()).context("Check failed")?;
  print_success(&format!("{} target(s) checked", engine.registry().len()));
  Ok(())
}
