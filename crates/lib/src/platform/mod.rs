pub mod os;

use os::Os;
use std::fmt;

/// System target triple in the `<arch>-<vendor>-<system>-<env>` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemTarget {
  pub arch: &'static str,
  pub os: Os,
}

impl SystemTarget {
  pub fn new(arch: &'static str, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the target of the running system
  pub fn current() -> Self {
    Self {
      arch: std::env::consts::ARCH,
      os: Os::current(),
    }
  }

  pub fn triple(&self) -> String {
    format!("{}-{}-{}-{}", self.arch, self.os.vendor(), self.os, self.os.env())
  }
}

impl fmt::Display for SystemTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Returns the triple of the running system (e.g., "x86_64-pc-linux-gnu")
pub fn system_target() -> String {
  SystemTarget::current().triple()
}
