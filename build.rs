use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
  println!("cargo:rerun-if-changed=build.rs");

  let version = match env::var("CARGO_PKG_VERSION") {
    Ok(v) => v,
    Err(_) => return,
  };
  let manifest_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
  let git_dir = manifest_dir.join(".git");
  if !git_dir.exists() {
    // Built from a source tarball, the plain version will do.
    return;
  }
  // <https://git-scm.com/docs/gitrepository-layout/>
  println!("cargo:rerun-if-changed={}", git_dir.join("HEAD").display());
  println!("cargo:rerun-if-changed={}", git_dir.join("refs").display());

  if let Some(summary) = git_commit_summary(&git_dir) {
    println!("cargo:rustc-env=CARGO_PKG_NICE_VERSION={} ({})", version, summary);
  }
}

/// Short hash and date of the checked out commit, e.g. `1a2b3c4 2024-03-01`.
fn git_commit_summary(git_dir: &Path) -> Option<String> {
  let output = Command::new("git")
    .arg(format!("--git-dir={}", git_dir.display()))
    .args(&["log", "-1", "--date=short", "--pretty=format:%h %cd"])
    .output()
    .ok()?;
  if !output.status.success() {
    return None;
  }
  let summary = String::from_utf8(output.stdout).ok()?;
  let summary = summary.trim();
  if summary.is_empty() {
    None
  } else {
    Some(summary.to_owned())
  }
}
