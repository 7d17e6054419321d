//! External tools and libraries, and the finders that locate them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};
use crate::execute::shell;
use crate::registry::{NodeData, TargetId};
use crate::schema::Validator;
use crate::target::Spec;

/// What a finder is asked to locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalQuery {
  pub kind: String,
  pub external_name: String,
}

/// A strategy locating externals on the host.
#[async_trait]
pub trait Finder: Send + Sync {
  /// Path of the external, or `None` to let the next finder try.
  async fn find(&self, engine: &Engine, query: &ExternalQuery) -> Result<Option<PathBuf>, EngineError>;
}

/// Searches `PATH` for executables.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathFinder;

#[async_trait]
impl Finder for PathFinder {
  async fn find(&self, _engine: &Engine, query: &ExternalQuery) -> Result<Option<PathBuf>, EngineError> {
    if query.kind != "executable" {
      return Ok(None);
    }
    let Some(path) = std::env::var_os("PATH") else {
      return Ok(None);
    };
    Ok(
      std::env::split_paths(&path)
        .map(|dir| dir.join(&query.external_name))
        .find(|candidate| is_executable(candidate)),
    )
  }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path
    .metadata()
    .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderSpec {
  pub hook: String,
}

pub(super) fn validate_finder(engine: &Engine, id: TargetId, data: &NodeData) -> Option<FinderSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let hook = v.string("hook", true);
  if let Some(hook) = &hook
    && engine.finder_hook(hook).is_none()
  {
    v.error("hook", format!("unknown finder hook '{}'", hook));
  }
  if !v.finish() {
    return None;
  }

  engine.register_finder(id);
  Some(FinderSpec { hook: hook? })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSpec {
  pub kind: String,
  pub provider: String,
  pub external_name: String,
  /// Set by the declaration or by the first finder that locates it.
  pub path: Option<PathBuf>,
}

impl ExternalSpec {
  pub fn query(&self) -> ExternalQuery {
    ExternalQuery {
      kind: self.kind.clone(),
      external_name: self.external_name.clone(),
    }
  }

  /// The resolved path, failing when no finder located the external.
  pub fn require_path(&self, engine: &Engine, id: TargetId) -> Result<PathBuf, EngineError> {
    self
      .path
      .clone()
      .ok_or_else(|| engine.diagnostics().fatal(engine.node(id).diagnostic("has no path")))
  }
}

pub(super) fn validate(engine: &Engine, data: &NodeData) -> Option<ExternalSpec> {
  let mut v = Validator::new(engine.registry(), engine.diagnostics(), data);
  let kind = v.string_or("kind", "unknown");
  let provider = v.string("provider", true);
  let external_name = v.string("external_name", true);
  let path = v.string("path", false).map(|p| data.dir.join(p));
  if !v.finish() {
    return None;
  }

  Some(ExternalSpec {
    kind,
    provider: provider?,
    external_name: external_name?,
    path,
  })
}

/// Ask every finder in registration order until one locates the external.
pub(super) async fn resolve(engine: &Arc<Engine>, id: TargetId) -> Result<(), EngineError> {
  let mut spec = engine.external_spec(id)?;
  if spec.path.is_some() {
    return Ok(());
  }

  let query = spec.query();
  for finder in engine.finders() {
    let finder_spec = engine.finder_spec(finder)?;
    let Some(hook) = engine.finder_hook(&finder_spec.hook) else {
      continue;
    };
    if let Some(path) = hook.find(engine, &query).await? {
      debug!(node = %engine.node(id).qualified(), path = %path.display(), "external found");
      spec.path = Some(path);
      engine.update_spec(id, Spec::External(spec));
      return Ok(());
    }
  }

  let node = engine.node(id);
  if node.is_builtin() {
    // Host tools are only required once something uses their path.
    warn!(node = %node.qualified(), "built-in external not found");
  } else {
    engine.diagnostics().error(node.diagnostic("can't resolve target"));
  }
  Ok(())
}

/// Run an executable external with `args` in `cwd`.
pub async fn run(engine: &Arc<Engine>, id: TargetId, args: &[String], cwd: &Path) -> Result<String, EngineError> {
  engine.expand(id).await?;
  let spec = engine.external_spec(id)?;
  if spec.kind != "executable" {
    return Err(engine.diagnostics().fatal(engine.node(id).diagnostic("not runnable")));
  }

  let path = spec.require_path(engine, id)?;
  shell::run_program(&path, args, cwd)
    .await
    .map_err(|e| engine.diagnostics().fail(e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::{Declaration, TargetClass};
  use crate::util::testutil::engine_at;
  use tempfile::TempDir;

  struct FixedFinder(PathBuf);

  #[async_trait]
  impl Finder for FixedFinder {
    async fn find(&self, _engine: &Engine, query: &ExternalQuery) -> Result<Option<PathBuf>, EngineError> {
      Ok((query.external_name == "fixed").then(|| self.0.clone()))
    }
  }

  fn external(engine: &Engine, name: &str, kind: &str) -> TargetId {
    engine
      .declare(
        Declaration::new(TargetClass::External, format!("{}:{}", kind, name))
          .field("kind", kind)
          .field("provider", "local")
          .field("external_name", name),
      )
      .unwrap()
  }

  fn finder(engine: &Engine, name: &str, hook: &str) -> TargetId {
    engine
      .declare(Declaration::new(TargetClass::Finder, name).field("hook", hook))
      .unwrap()
  }

  #[tokio::test]
  async fn path_finder_locates_shell() {
    let temp = TempDir::new().unwrap();
    let found = PathFinder
      .find(
        &engine_at(temp.path()),
        &ExternalQuery {
          kind: "executable".to_string(),
          external_name: "sh".to_string(),
        },
      )
      .await
      .unwrap();

    assert!(found.is_some_and(|p| p.ends_with("sh")));
  }

  #[tokio::test]
  async fn path_finder_ignores_libraries() {
    let temp = TempDir::new().unwrap();
    let query = ExternalQuery {
      kind: "library".to_string(),
      external_name: "sh".to_string(),
    };

    assert_eq!(PathFinder.find(&engine_at(temp.path()), &query).await.unwrap(), None);
  }

  #[tokio::test]
  async fn finders_run_in_registration_order() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::into_inner(engine_at(temp.path()))
      .unwrap()
      .with_finder("fixed", FixedFinder(PathBuf::from("/opt/fixed")));
    let engine = Arc::new(engine);
    finder(&engine, "first", "fixed");
    finder(&engine, "second", "path");
    let fixed = external(&engine, "fixed", "executable");
    let sh = external(&engine, "sh", "executable");
    engine.prepare_all().await.unwrap();

    engine.expand(fixed).await.unwrap();
    engine.expand(sh).await.unwrap();

    assert_eq!(engine.external_spec(fixed).unwrap().path, Some(PathBuf::from("/opt/fixed")));
    assert!(engine.external_spec(sh).unwrap().path.is_some());
  }

  #[tokio::test]
  async fn unresolved_external_is_an_error() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    finder(&engine, "default", "path");
    let missing = external(&engine, "simba-does-not-exist", "executable");
    engine.prepare_all().await.unwrap();

    engine.expand(missing).await.unwrap();

    assert_eq!(engine.diagnostics().count(), 1);
    assert!(engine.diagnostics().messages()[0].contains("can't resolve target"));
  }

  #[tokio::test]
  async fn missing_builtin_external_fails_only_when_used() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    finder(&engine, "default", "path");
    let missing = engine
      .declare(
        Declaration::new(TargetClass::External, "executable:simba-missing-tool")
          .field("kind", "executable")
          .field("provider", "system")
          .field("external_name", "simba-missing-tool")
          .builtin(),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();

    engine.expand(missing).await.unwrap();
    assert_eq!(engine.diagnostics().count(), 0);

    let spec = engine.external_spec(missing).unwrap();
    assert!(matches!(spec.require_path(&engine, missing), Err(EngineError::Fatal(_))));
  }

  #[tokio::test]
  async fn unknown_finder_hook_is_rejected() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    finder(&engine, "bogus", "nowhere");

    assert!(matches!(engine.prepare_all().await, Err(EngineError::Aborted(1))));
  }

  #[tokio::test]
  async fn external_qualified_name_uses_kind() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    let id = external(&engine, "ninja", "executable");

    assert_eq!(engine.node(id).qualified(), "external.executable::ninja");
  }

  #[tokio::test]
  async fn only_executables_run() {
    let temp = TempDir::new().unwrap();
    let engine = engine_at(temp.path());
    let lib = engine
      .declare(
        Declaration::new(TargetClass::External, "library:z")
          .field("kind", "library")
          .field("provider", "local")
          .field("external_name", "z")
          .field("path", "/usr/lib/libz.so"),
      )
      .unwrap();
    let echo = engine
      .declare(
        Declaration::new(TargetClass::External, "executable:echo")
          .field("kind", "executable")
          .field("provider", "local")
          .field("external_name", "echo")
          .field("path", "/bin/echo"),
      )
      .unwrap();
    engine.prepare_all().await.unwrap();

    let err = run(&engine, lib, &[], temp.path()).await.unwrap_err();
    let out = run(&engine, echo, &["-n".to_string(), "hi".to_string()], temp.path()).await.unwrap();

    assert!(matches!(err, EngineError::Fatal(ref m) if m.contains("not runnable")));
    assert_eq!(out, "hi");
  }
}
