//! The build-graph engine.
//!
//! An [`Engine`] owns the registry, the diagnostics sink and the progress pool
//! for one run. Recipes populate it during the load phase, after which every
//! target is prepared. Commands then expand the working set and hand it to a
//! builder.
//!
//! # Phases
//!
//! ```text
//! preload ──► load ──► prepare ──► postload
//!             │        │           │
//!             │        │           └─ build / tree / check
//!             │        └─ validate every target, no new targets
//!             └─ built-in and recipe declarations
//! ```

mod graph;
mod types;

pub use types::{EngineError, Options, Phase};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::consts::DEFAULT_BUILDER;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::execute::DirectBuilder;
use crate::ninja::NinjaBuilder;
use crate::pool::{Pool, Progress};
use crate::registry::{Declaration, Node, Registry, TargetClass, TargetId};
use crate::target::{Builder, Finder, PathFinder};
use crate::tree::{self, TreeNode};
use crate::util::paths::{normalize, relative_path};

/// Source of target declarations.
///
/// The engine calls [`RecipeLoader::include`] once with the root recipe. The
/// loader is expected to call back into [`Engine::declare`] and to handle
/// nested includes itself.
pub trait RecipeLoader {
  fn include(&mut self, engine: &Arc<Engine>, path: &Path) -> Result<(), EngineError>;
}

/// Receives a status line at every lifecycle transition.
pub trait Reporter: Send + Sync {
  fn report_status(&self, progress: Progress, message: &str);
}

/// Logs status lines through `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
  fn report_status(&self, progress: Progress, message: &str) {
    debug!("{} {}", progress, message);
  }
}

pub struct Engine {
  options: Options,
  registry: Registry,
  diagnostics: Diagnostics,
  pool: Pool,
  phase: Mutex<Phase>,
  filetypes: Mutex<HashMap<String, TargetId>>,
  finders: Mutex<Vec<TargetId>>,
  reporter: Box<dyn Reporter>,
  finder_hooks: HashMap<String, Arc<dyn Finder>>,
  builder_hooks: HashMap<String, Arc<dyn Builder>>,
}

impl Engine {
  /// Create an engine with the built-in finder and builder hooks.
  pub fn new(options: Options) -> Self {
    Self {
      options,
      registry: Registry::new(),
      diagnostics: Diagnostics::new(),
      pool: Pool::new(),
      phase: Mutex::new(Phase::Preload),
      filetypes: Mutex::new(HashMap::new()),
      finders: Mutex::new(Vec::new()),
      reporter: Box::new(TracingReporter),
      finder_hooks: HashMap::new(),
      builder_hooks: HashMap::new(),
    }
    .with_finder("path", PathFinder)
    .with_builder("direct", DirectBuilder)
    .with_builder("ninja", NinjaBuilder)
  }

  pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
    self.reporter = Box::new(reporter);
    self
  }

  /// Register a finder strategy that `finder` targets can name as their hook.
  pub fn with_finder(mut self, hook: &str, finder: impl Finder + 'static) -> Self {
    self.finder_hooks.insert(hook.to_string(), Arc::new(finder));
    self
  }

  /// Register a build strategy that `builder` targets can name as their hook.
  pub fn with_builder(mut self, hook: &str, builder: impl Builder + 'static) -> Self {
    self.builder_hooks.insert(hook.to_string(), Arc::new(builder));
    self
  }

  pub fn options(&self) -> &Options {
    &self.options
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn diagnostics(&self) -> &Diagnostics {
    &self.diagnostics
  }

  pub fn pool(&self) -> &Pool {
    &self.pool
  }

  pub fn phase(&self) -> Phase {
    *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  pub(crate) fn set_phase(&self, phase: Phase) {
    debug!(phase = ?phase, "entering phase");
    *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
  }

  pub fn node(&self, id: TargetId) -> Arc<Node> {
    self.registry.node(id)
  }

  pub fn lookup(&self, qualified: &str) -> Option<TargetId> {
    self.registry.lookup(qualified)
  }

  pub fn report_status(&self, message: &str) {
    self.reporter.report_status(self.pool.progress(), message);
  }

  /// Declare a target, merging into any target already holding its name.
  pub fn declare(&self, decl: Declaration) -> Result<TargetId, EngineError> {
    self.report_status(&format!("Creating target '{}::{}'", decl.class, decl.name));
    self
      .registry
      .declare(decl, self.options.rootdir.clone(), self.phase(), &self.diagnostics)
  }

  /// Return the target holding the declaration's name, declaring it only if absent.
  pub fn synthesize(&self, decl: Declaration) -> Result<TargetId, EngineError> {
    self
      .registry
      .intern(decl, self.options.rootdir.clone(), self.phase(), &self.diagnostics)
  }

  /// Run the load phase, then prepare every declared target.
  pub async fn load(self: &Arc<Self>, loader: &mut dyn RecipeLoader) -> Result<(), EngineError> {
    self.set_phase(Phase::Load);
    crate::recipes::declare_builtins(self)?;

    let root = self.options.rootdir.join(&self.options.recipe_file);
    info!(recipe = %root.display(), "loading recipes");
    loader.include(self, &root)?;
    self.diagnostics.checkpoint()?;

    self.prepare_all().await
  }

  /// Prepare every registered target. Declaring new targets is an error meanwhile.
  ///
  /// A target that was referenced but never declared is fatal here.
  pub async fn prepare_all(self: &Arc<Self>) -> Result<(), EngineError> {
    graph::verify_acyclic(self)?;

    self.set_phase(Phase::Prepare);
    for id in self.registry.ids() {
      let data = self.node(id).snapshot();
      if data.is_forward_ref() {
        return Err(self.diagnostics.fatal(data.diagnostic("forward reference")));
      }
      self.prepare(id).await?;
    }
    self.diagnostics.checkpoint()?;

    self.set_phase(Phase::Postload);
    Ok(())
  }

  /// Targets a command operates on.
  ///
  /// Requested targets are looked up by qualified name. Without a request this
  /// is every target declared by a recipe.
  pub fn working_set(&self) -> Result<Vec<TargetId>, EngineError> {
    if self.options.targets.is_empty() {
      return Ok(
        self
          .registry
          .ids()
          .into_iter()
          .filter(|id| !self.node(*id).is_builtin())
          .collect(),
      );
    }

    self
      .options
      .targets
      .iter()
      .map(|name| {
        self
          .lookup(name)
          .ok_or_else(|| self.diagnostics.fatal(Diagnostic::new(format!("target '{}' not found", name))))
      })
      .collect()
  }

  /// Build the working set with the configured builder.
  pub async fn build(self: &Arc<Self>) -> Result<(), EngineError> {
    self.report_status("Building...");
    tokio::fs::create_dir_all(&self.options.builddir).await?;

    let targets = self.working_set()?;
    let builder = if self.options.builder == DEFAULT_BUILDER {
      self
        .registry
        .default_of(TargetClass::Builder)
        .ok_or_else(|| self.diagnostics.fatal(Diagnostic::new("can't find a default for 'builder'")))?
    } else {
      let qualified = format!("{}::{}", TargetClass::Builder, self.options.builder);
      match self.lookup(&qualified) {
        Some(id) if !self.node(id).data().is_forward_ref() => id,
        _ => return Err(self.diagnostics.fatal(Diagnostic::new("doesn't exist").target(qualified))),
      }
    };

    crate::target::builder::build(self, builder, &targets).await
  }

  /// Expand every registered target without producing anything.
  pub async fn check(self: &Arc<Self>) -> Result<(), EngineError> {
    self.report_status("Checking...");
    for id in self.registry.ids() {
      self.expand(id).await?;
    }
    self.diagnostics.checkpoint()
  }

  /// Resolve the dependency forest of every registered target.
  pub async fn tree(self: &Arc<Self>) -> Result<Vec<TreeNode>, EngineError> {
    self.report_status("Resolving the tree...");
    let targets = self.registry.ids();
    let forest = tree::forest(self, &targets).await?;
    self.diagnostics.checkpoint()?;
    Ok(forest)
  }

  /// Filesystem path of a path-like target.
  pub fn path_of(&self, id: TargetId) -> PathBuf {
    let node = self.node(id);
    let data = node.data();
    normalize(&data.dir.join(&data.name))
  }

  /// Path relative to the root directory, or unchanged when outside of it.
  pub fn rootdir_relpath(&self, path: &Path) -> PathBuf {
    if !path.is_absolute() {
      return path.to_path_buf();
    }
    let path = normalize(path);
    match path.strip_prefix(&self.options.rootdir) {
      Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
      Ok(rel) => rel.to_path_buf(),
      Err(_) => path,
    }
  }

  /// Location inside the build directory mirroring `path` under the root directory.
  pub fn builddir_path(&self, path: &Path) -> PathBuf {
    let rel = self.rootdir_relpath(path);
    if rel.is_absolute() {
      return rel;
    }
    normalize(&self.options.builddir.join(rel))
  }

  /// Root directory as seen from the build directory.
  pub fn rootdir_from_builddir(&self) -> PathBuf {
    relative_path(&self.options.builddir, &self.options.rootdir).unwrap_or_else(|| self.options.rootdir.clone())
  }

  /// Claim `extension` for a filetype. Returns the previous owner on conflict.
  pub(crate) fn register_extension(&self, extension: &str, filetype: TargetId) -> Option<TargetId> {
    let mut filetypes = self.filetypes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match filetypes.get(extension) {
      Some(owner) if *owner != filetype => Some(*owner),
      _ => {
        filetypes.insert(extension.to_string(), filetype);
        None
      }
    }
  }

  /// Filetype claiming the extension of `path`.
  pub fn filetype_for(&self, path: &Path) -> Option<TargetId> {
    let ext = path.extension()?.to_string_lossy();
    let filetypes = self.filetypes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    filetypes.get(&format!(".{}", ext)).copied()
  }

  pub(crate) fn register_finder(&self, finder: TargetId) {
    let mut finders = self.finders.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if !finders.contains(&finder) {
      finders.push(finder);
    }
  }

  /// Finder targets in registration order.
  pub fn finders(&self) -> Vec<TargetId> {
    self.finders.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
  }

  pub(crate) fn finder_hook(&self, hook: &str) -> Option<Arc<dyn Finder>> {
    self.finder_hooks.get(hook).cloned()
  }

  pub(crate) fn builder_hook(&self, hook: &str) -> Option<Arc<dyn Builder>> {
    self.builder_hooks.get(hook).cloned()
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("options", &self.options)
      .field("targets", &self.registry.len())
      .field("phase", &self.phase())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{engine_at, write_files};

  struct StaticRecipes(Vec<Declaration>);

  impl RecipeLoader for StaticRecipes {
    fn include(&mut self, engine: &Arc<Engine>, _path: &Path) -> Result<(), EngineError> {
      for decl in self.0.drain(..) {
        engine.declare(decl)?;
      }
      Ok(())
    }
  }

  fn engine_with(root: &Path, builder: &str, targets: &[&str]) -> Arc<Engine> {
    Arc::new(Engine::new(Options {
      rootdir: root.to_path_buf(),
      builddir: root.join("builddir"),
      builder: builder.to_string(),
      targets: targets.iter().map(|t| t.to_string()).collect(),
      ..Options::default()
    }))
  }

  #[tokio::test]
  async fn load_declares_builtins_and_prepares() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &["README"]);
    let engine = engine_with(dir.path(), DEFAULT_BUILDER, &[]);

    let mut recipes = StaticRecipes(vec![Declaration::new(TargetClass::File, "README")]);
    engine.load(&mut recipes).await.unwrap();

    assert_eq!(engine.phase(), Phase::Postload);
    assert!(engine.lookup("generator::link").is_some());
    let readme = engine.lookup("file::README").unwrap();
    assert!(engine.node(readme).is_prepared());
  }

  #[tokio::test]
  async fn load_rejects_undeclared_references() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), DEFAULT_BUILDER, &[]);

    let mut recipes = StaticRecipes(vec![Declaration::new(TargetClass::Target, "typo")]);
    let err = engine.load(&mut recipes).await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(ref m) if m.ends_with("typo: forward reference")));
    assert_eq!(engine.phase(), Phase::Prepare);
  }

  #[tokio::test]
  async fn working_set_skips_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), DEFAULT_BUILDER, &[]);
    let mut recipes = StaticRecipes(vec![Declaration::new(TargetClass::File, "README")]);
    engine.load(&mut recipes).await.unwrap();

    let names: Vec<String> = engine
      .working_set()
      .unwrap()
      .into_iter()
      .map(|id| engine.node(id).qualified())
      .collect();
    assert_eq!(names, vec!["file::README"]);
  }

  #[tokio::test]
  async fn working_set_rejects_unknown_targets() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), DEFAULT_BUILDER, &["missing"]);
    engine.load(&mut StaticRecipes(Vec::new())).await.unwrap();

    let err = engine.working_set().unwrap_err();
    assert!(err.to_string().ends_with("target 'missing' not found"));
    assert_eq!(engine.diagnostics().count(), 1);
  }

  #[tokio::test]
  async fn build_with_unknown_builder_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(dir.path(), "make", &[]);
    engine.load(&mut StaticRecipes(Vec::new())).await.unwrap();

    let err = engine.build().await.unwrap_err();
    assert!(err.to_string().contains("builder::make"));
    assert!(err.to_string().contains("doesn't exist"));
  }

  #[test]
  fn paths_relative_to_rootdir() {
    let engine = engine_at(Path::new("/src/project"));

    assert_eq!(engine.rootdir_relpath(Path::new("/src/project/a/b.c")), PathBuf::from("a/b.c"));
    assert_eq!(engine.rootdir_relpath(Path::new("/src/project")), PathBuf::from("."));
    assert_eq!(engine.rootdir_relpath(Path::new("/usr/include/x.h")), PathBuf::from("/usr/include/x.h"));
    assert_eq!(engine.rootdir_relpath(Path::new("rel/x.c")), PathBuf::from("rel/x.c"));
  }

  #[test]
  fn builddir_mirrors_rootdir() {
    let engine = engine_at(Path::new("/src/project"));

    assert_eq!(
      engine.builddir_path(Path::new("/src/project/src/a.o")),
      PathBuf::from("/src/project/builddir/src/a.o")
    );
    assert_eq!(engine.builddir_path(Path::new("app")), PathBuf::from("/src/project/builddir/app"));
    assert_eq!(engine.builddir_path(Path::new("/tmp/x.o")), PathBuf::from("/tmp/x.o"));
    assert_eq!(engine.rootdir_from_builddir(), PathBuf::from(".."));
  }
}
