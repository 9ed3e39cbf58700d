//! The language manifest published alongside the translation releases. Its
//! shape is fixed:
//!
//! ```json
//! {"languages": [{"id": "1", "name": "German", "download_url": "...",
//!   "replaces": [{"region": {"id": "EU"}, "locale": {"id": "de"}, "path": "..."}]}]}
//! ```

use crate::impl_prelude::*;
use crate::utils;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LanguageManifest {
  pub languages: Vec<LanguageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LanguageEntry {
  pub id: String,
  pub name: String,
  pub download_url: String,
  #[serde(default)]
  pub replaces: Vec<ReplacementEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ReplacementEntrySerde")]
pub struct ReplacementEntry {
  pub region_id: String,
  pub locale_id: String,
  pub path: String,
}

#[derive(Debug, Deserialize)]
struct ReplacementEntrySerde {
  region: IdRefSerde,
  locale: IdRefSerde,
  path: String,
}

#[derive(Debug, Deserialize)]
struct IdRefSerde {
  id: String,
}

impl From<ReplacementEntrySerde> for ReplacementEntry {
  fn from(raw: ReplacementEntrySerde) -> Self {
    Self { region_id: raw.region.id, locale_id: raw.locale.id, path: raw.path }
  }
}

impl ReplacementEntry {
  /// The key under which the pair is stored in a decoding table.
  pub fn decoding_key(&self) -> String {
    utils::fast_concat(&[&self.region_id, "-", &self.locale_id])
  }
}

/// How language entries are ordered by their `id`. Manifests don't say whether
/// ids are numbers or arbitrary strings, and the two orders diverge as soon as
/// multi-digit ids appear (`"10" < "2"` lexicographically).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdOrdering {
  Lexicographic,
  /// Ids which parse as unsigned integers are compared as numbers and come
  /// before all other ids, the rest are compared lexicographically.
  Numeric,
}

impl IdOrdering {
  pub const ALL: &'static [Self] = &[Self::Lexicographic, Self::Numeric];

  pub fn id(self) -> &'static str {
    match self {
      Self::Lexicographic => "lexicographic",
      Self::Numeric => "numeric",
    }
  }

  pub fn compare(self, a: &str, b: &str) -> Ordering {
    match self {
      Self::Lexicographic => a.cmp(b),
      Self::Numeric => match (u64::from_str(a), u64::from_str(b)) {
        (Ok(a_num), Ok(b_num)) => a_num.cmp(&b_num).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
      },
    }
  }
}

impl Default for IdOrdering {
  fn default() -> Self { Self::Numeric }
}

impl FromStr for IdOrdering {
  type Err = AnyError;
  fn from_str(s: &str) -> AnyResult<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|ordering| ordering.id() == s)
      .ok_or_else(|| format_err!("Unknown id ordering: {:?}", s))
  }
}

impl LanguageManifest {
  /// Parses and validates a manifest document.
  pub fn from_slice(bytes: &[u8]) -> AnyResult<Self> {
    let manifest: Self =
      serde_json::from_slice(bytes).context("Failed to deserialize the language manifest")?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Language names become directory names and ids become substitution
  /// values and sort keys, so both have to be unique within one manifest.
  pub fn validate(&self) -> AnyResult<()> {
    let mut seen_ids = HashSet::with_capacity(self.languages.len());
    let mut seen_names = HashSet::with_capacity(self.languages.len());
    for language in &self.languages {
      ensure!(
        utils::is_safe_file_name(&language.name),
        "Language name {:?} (id {:?}) can't be used as a directory name",
        language.name,
        language.id,
      );
      ensure!(seen_ids.insert(&language.id), "Duplicate language id {:?}", language.id);
      ensure!(seen_names.insert(&language.name), "Duplicate language name {:?}", language.name);
    }
    Ok(())
  }

  /// Returns the entries in the order in which they are laid out on disk.
  /// The sort is stable, entries comparing equal keep their manifest order.
  pub fn sorted_languages(&self, ordering: IdOrdering) -> Vec<&LanguageEntry> {
    let mut languages: Vec<&LanguageEntry> = self.languages.iter().collect();
    languages.sort_by(|a, b| ordering.compare(&a.id, &b.id));
    languages
  }
}
