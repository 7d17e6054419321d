//! Lexical path helpers.
//!
//! None of these touch the filesystem, so they work on outputs that do not
//! exist yet.

use std::path::{Component, Path, PathBuf};

/// Remove `.` components and fold `..` into the preceding component.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Path of `target` relative to the directory `base`.
///
/// Both paths should be absolute. Returns `None` when they share no root.
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
  let base = normalize(base);
  let target = normalize(target);

  let mut base_parts = base.components().peekable();
  let mut target_parts = target.components().peekable();

  if base_parts.peek() != target_parts.peek() {
    return None;
  }

  while let (Some(a), Some(b)) = (base_parts.peek(), target_parts.peek()) {
    if a != b {
      break;
    }
    base_parts.next();
    target_parts.next();
  }

  let mut out = PathBuf::new();
  for _ in base_parts {
    out.push("..");
  }
  for part in target_parts {
    out.push(part.as_os_str());
  }
  if out.as_os_str().is_empty() {
    out.push(".");
  }
  Some(out)
}

/// Split a path into the part before its extension and the extension with its dot.
pub fn split_extension(path: &Path) -> (String, String) {
  let full = path.to_string_lossy().into_owned();
  match path.extension() {
    Some(ext) => {
      let ext = format!(".{}", ext.to_string_lossy());
      let stem = full[..full.len() - ext.len()].to_string();
      (stem, ext)
    }
    None => (full, String::new()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_folds_dots() {
    assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
  }

  #[test]
  fn relative_path_walks_up_and_down() {
    assert_eq!(
      relative_path(Path::new("/src/proj/builddir"), Path::new("/src/proj")),
      Some(PathBuf::from(".."))
    );
    assert_eq!(
      relative_path(Path::new("/src/proj"), Path::new("/src/proj/lib/a.c")),
      Some(PathBuf::from("lib/a.c"))
    );
    assert_eq!(
      relative_path(Path::new("/src/a"), Path::new("/src/b/c")),
      Some(PathBuf::from("../b/c"))
    );
    assert_eq!(relative_path(Path::new("/src"), Path::new("/src")), Some(PathBuf::from(".")));
  }

  #[test]
  fn relative_path_needs_common_root() {
    assert_eq!(relative_path(Path::new("/src"), Path::new("lib")), None);
  }

  #[test]
  fn split_extension_keeps_directories() {
    assert_eq!(
      split_extension(Path::new("/src/dir.d/main.c")),
      ("/src/dir.d/main".to_string(), ".c".to_string())
    );
    assert_eq!(
      split_extension(Path::new("/src/Makefile")),
      ("/src/Makefile".to_string(), String::new())
    );
  }
}
