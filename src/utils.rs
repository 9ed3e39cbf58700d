pub mod json;

use std::fs;
use std::io;
use std::path::{Component as PathComponent, Path};

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

pub fn get_timestamp() -> Timestamp { time::OffsetDateTime::now_utc().unix_timestamp() }

pub fn fast_concat(strings: &[&str]) -> String {
  let mut capacity = 0;
  for s in strings {
    capacity += s.len();
  }
  let mut result = String::with_capacity(capacity);
  for s in strings {
    result.push_str(s);
  }
  result
}

pub fn create_dir_recursively(path: &Path) -> io::Result<()> {
  fs::DirBuilder::new().recursive(true).create(path)
}

/// Removes the whole directory tree at `path` (if there is one) and creates
/// an empty directory in its place.
pub fn recreate_dir(path: &Path) -> io::Result<()> {
  match fs::remove_dir_all(path) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
    Err(e) => return Err(e),
  }
  create_dir_recursively(path)
}

pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
  match fs::remove_file(path) {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}

/// Checks that the string can be used as the name of exactly one file or
/// directory, i.e. it is a single normal path component on every platform we
/// care about.
pub fn is_safe_file_name(name: &str) -> bool {
  if name.is_empty() || name.contains(&['/', '\\', '\0'][..]) {
    return false;
  }
  let mut components = Path::new(name).components();
  matches!((components.next(), components.next()), (Some(PathComponent::Normal(_)), None))
}

/// Joins relative path components with forward slashes, which is what goes
/// into archive entry names regardless of the host platform.
pub fn to_slash_path(path: &Path) -> Option<String> {
  let mut result = String::new();
  for component in path.components() {
    match component {
      PathComponent::Normal(c) => {
        if !result.is_empty() {
          result.push('/');
        }
        result.push_str(c.to_str()?);
      }
      PathComponent::CurDir => {}
      _ => return None,
    }
  }
  Some(result)
}

/// Uppercases the first character, used for normalizing folder names
/// derived from asset names.
pub fn capitalize_first(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_is_safe_file_name() {
    assert!(is_safe_file_name("German"));
    assert!(is_safe_file_name("Ukrainian (beta)"));
    assert!(!is_safe_file_name(""));
    assert!(!is_safe_file_name("."));
    assert!(!is_safe_file_name(".."));
    assert!(!is_safe_file_name("a/b"));
    assert!(!is_safe_file_name("a\\b"));
    assert!(!is_safe_file_name("/abs"));
    assert!(!is_safe_file_name("nul\0byte"));
  }

  #[test]
  fn test_to_slash_path() {
    assert_eq!(to_slash_path(Path::new("German/config.ini")).as_deref(), Some("German/config.ini"));
    assert_eq!(to_slash_path(Path::new("./a/b")).as_deref(), Some("a/b"));
    assert_eq!(to_slash_path(Path::new("../a")), None);
    assert_eq!(to_slash_path(Path::new("/a")), None);
  }

  #[test]
  fn test_capitalize_first() {
    assert_eq!(capitalize_first("ukrainian"), "Ukrainian");
    assert_eq!(capitalize_first("ёлка"), "Ёлка");
    assert_eq!(capitalize_first(""), "");
  }

  #[test]
  fn test_recreate_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("out");
    recreate_dir(&dir).unwrap();
    fs::write(dir.join("stale.txt"), b"old").unwrap();
    recreate_dir(&dir).unwrap();
    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
  }
}
