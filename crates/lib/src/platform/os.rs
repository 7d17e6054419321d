use std::fmt;

/// Operating systems with a known vendor/environment pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  Other(&'static str),
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Self {
    match std::env::consts::OS {
      "linux" => Self::Linux,
      "macos" => Self::MacOs,
      "windows" => Self::Windows,
      other => Self::Other(other),
    }
  }

  /// Returns the lowercase system name used in target triples
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
      Self::Other(name) => name,
    }
  }

  pub fn vendor(&self) -> &'static str {
    match self {
      Self::MacOs => "apple",
      _ => "pc",
    }
  }

  /// Object format or ABI flavour of the system.
  pub fn env(&self) -> &'static str {
    match self {
      Self::MacOs => "macho",
      Self::Linux => "gnu",
      _ => "elf",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn macos_uses_darwin_identifier() {
    // Darwin is the expected identifier for macOS in target triples
    assert_eq!(Os::MacOs.as_str(), "darwin");
    assert_eq!(Os::MacOs.vendor(), "apple");
    assert_eq!(Os::MacOs.env(), "macho");
  }

  #[test]
  fn unknown_systems_fall_back_to_elf() {
    let os = Os::Other("freebsd");
    assert_eq!(os.as_str(), "freebsd");
    assert_eq!(os.vendor(), "pc");
    assert_eq!(os.env(), "elf");
  }
}
