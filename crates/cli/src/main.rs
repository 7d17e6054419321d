mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, print_error};
use simba_lib::Options;
use simba_lib::consts::{DEFAULT_BUILDDIR, DEFAULT_BUILDER, DEFAULT_RECIPE_FILE};
use simba_lib::platform::system_target;

/// simba - build graphs from Lua recipes
#[derive(Parser)]
#[command(name = "simba")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Directory holding the root recipe
  #[arg(short = 'D', long, global = true, default_value = ".")]
  rootdir: PathBuf,

  /// Directory generated files are written to
  #[arg(short = 'B', long, global = true, default_value = DEFAULT_BUILDDIR)]
  builddir: PathBuf,

  /// Builder target driving the build
  #[arg(short = 'b', long, global = true, default_value = DEFAULT_BUILDER)]
  builder: String,

  /// System target triple exposed to recipes
  #[arg(short = 't', long, global = true)]
  systarget: Option<String>,

  /// Recipe file loaded from each directory
  #[arg(short = 'r', long, global = true, default_value = DEFAULT_RECIPE_FILE)]
  recipe_file: String,

  /// Qualified name of a target to build (repeatable)
  #[arg(short = 'T', long = "target", global = true)]
  targets: Vec<String>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Expand the requested targets without generating anything
  #[arg(short, long, global = true)]
  dry_run: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build the requested targets (default)
  Build,

  /// Print the resolved dependency forest
  Tree {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Expand every target without producing anything
  Check,
}

impl Cli {
  fn options(&self) -> Options {
    Options {
      rootdir: self.rootdir.clone(),
      builddir: self.builddir.clone(),
      builder: self.builder.clone(),
      systarget: self.systarget.clone().unwrap_or_else(system_target),
      recipe_file: self.recipe_file.clone(),
      targets: self.targets.clone(),
      verbose: self.verbose,
      dry_run: self.dry_run,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let options = cli.options();
  let result = match cli.command.unwrap_or(Commands::Build) {
    Commands::Build => cmd::cmd_build(options),
    Commands::Tree { format } => cmd::cmd_tree(options, format),
    Commands::Check => cmd::cmd_check(options),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}
