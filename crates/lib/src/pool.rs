//! Progress accounting over every expanded target.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use crate::registry::TargetId;

#[derive(Debug, Default)]
struct Sets {
  all: HashSet<TargetId>,
  skipped: HashSet<TargetId>,
  running: HashSet<TargetId>,
  failed: HashSet<TargetId>,
  finished: HashSet<TargetId>,
}

/// Counters fed by lifecycle transitions.
#[derive(Debug, Default)]
pub struct Pool {
  sets: Mutex<Sets>,
}

impl Pool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Count a target towards the total.
  pub fn add(&self, id: TargetId) {
    self.lock().all.insert(id);
  }

  pub fn skip(&self, id: TargetId) {
    let mut sets = self.lock();
    sets.all.insert(id);
    sets.skipped.insert(id);
  }

  pub fn start(&self, id: TargetId) {
    let mut sets = self.lock();
    sets.all.insert(id);
    sets.running.insert(id);
  }

  pub fn finish(&self, id: TargetId, success: bool) {
    let mut sets = self.lock();
    sets.running.remove(&id);
    if success {
      sets.finished.insert(id);
    } else {
      sets.failed.insert(id);
    }
  }

  pub fn progress(&self) -> Progress {
    let sets = self.lock();
    Progress {
      all: sets.all.len(),
      skipped: sets.skipped.len(),
      running: sets.running.len(),
      failed: sets.failed.len(),
      finished: sets.finished.len(),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Sets> {
    self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

/// A snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
  pub all: usize,
  pub skipped: usize,
  pub running: usize,
  pub failed: usize,
  pub finished: usize,
}

impl Progress {
  /// Targets that reached a final state.
  pub fn completed(&self) -> usize {
    self.skipped + self.failed + self.finished
  }

  pub fn remaining(&self) -> usize {
    self.all.saturating_sub(self.completed() + self.running)
  }

  pub fn percentage(&self) -> f64 {
    if self.all == 0 {
      0.0
    } else {
      self.completed() as f64 / self.all as f64 * 100.0
    }
  }
}

/// Renders as `[pct% skipped/failed remaining/running/completed/all]`.
impl fmt::Display for Progress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{:.2}% {}/{} {}/{}/{}/{}]",
      self.percentage(),
      self.skipped,
      self.failed,
      self.remaining(),
      self.running,
      self.completed(),
      self.all
    )
  }
}
