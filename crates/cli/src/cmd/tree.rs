//! Implementation of the `simba tree` command.

use anyhow::{Context, Result};

use crate::output::{OutputFormat, print_json};
use simba_lib::Options;
use simba_lib::tree::render;

pub fn cmd_tree(options: Options, format: OutputFormat) -> Result<()> {
  let (runtime, engine) = super::load(options)?;
  let forest = runtime.block_on(engine.tree()).context("Failed to resolve the tree")?;

  if format.is_json() {
    print_json(&forest)?;
  } else {
    print!("{}", render(&forest));
  }
  Ok(())
}
