//! Decides whether the packaged output has to be regenerated, by comparing
//! the publication time of the upstream release against a reference point:
//! the latest commit of the mirror repository or the time of our last run.

use crate::impl_prelude::*;
use crate::utils::{self, Timestamp};

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
  pub name: String,
  pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
  pub tag: String,
  pub published_at: OffsetDateTime,
  pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
  pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
    self.assets.iter().find(|asset| asset.name == name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
  pub committer_date: OffsetDateTime,
}

pub fn parse_timestamp(s: &str) -> AnyResult<OffsetDateTime> {
  OffsetDateTime::parse(s, &Rfc3339).with_context(|| format!("Invalid timestamp {:?}", s))
}

/// The mirror's latest commit predating the release means the mirror hasn't
/// caught up yet and our output has to be regenerated. Equal timestamps mean
/// there is nothing to do.
pub fn should_update(release: &ReleaseInfo, commit: &CommitInfo) -> bool {
  commit.committer_date < release.published_at
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
  Commit(CommitInfo),
  /// The mirror has no commits at all.
  NoCommits,
  LastRun(OffsetDateTime),
  /// No last-run marker was found.
  NeverRan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
  Update,
  UpToDate,
  Undecidable(String),
}

pub fn decide(release: &ReleaseInfo, reference: &Reference) -> Decision {
  let decision = match reference {
    Reference::Commit(commit) => should_update(release, commit),
    Reference::LastRun(last_run) => *last_run < release.published_at,
    Reference::NeverRan => true,
    Reference::NoCommits => {
      return Decision::Undecidable("the mirror repository has no commits".to_owned());
    }
  };
  if decision {
    Decision::Update
  } else {
    Decision::UpToDate
  }
}

/// Reads the last-run marker, a file with a single integer of seconds since
/// the Unix epoch. A missing file means there was no successful run yet.
pub fn read_last_run_marker(path: &Path) -> AnyResult<Option<OffsetDateTime>> {
  let text = match fs::read_to_string(path) {
    Ok(text) => text,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => {
      return Err(AnyError::new(e).context(format!("Failed to read the marker {:?}", path)));
    }
  };
  let timestamp = Timestamp::from_str(text.trim())
    .with_context(|| format!("The marker {:?} doesn't contain a timestamp", path))?;
  let time = OffsetDateTime::from_unix_timestamp(timestamp)
    .with_context(|| format!("The timestamp in the marker {:?} is out of range", path))?;
  Ok(Some(time))
}

pub fn write_last_run_marker(path: &Path) -> AnyResult<Timestamp> {
  let timestamp = utils::get_timestamp();
  if let Some(parent) = path.parent() {
    utils::create_dir_recursively(parent)
      .with_context(|| format!("Failed to create directory {:?}", parent))?;
  }
  fs::write(path, timestamp.to_string())
    .with_context(|| format!("Failed to write the marker {:?}", path))?;
  Ok(timestamp)
}
