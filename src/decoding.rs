use crate::impl_prelude::*;
use crate::manifest::ReplacementEntry;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Maps `"{region}-{locale}"` pairs of the replaced in-game languages to
/// descriptions shown to the end user. Pairs missing from the table decode
/// to an empty description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodingTable {
  entries: IndexMap<String, String>,
}

static BUILTIN_ENTRIES: Lazy<IndexMap<&'static str, &'static str>> = Lazy::new(|| {
  indexmap! {
    "JP-ja" => "Japanese for Japan region",
    "US-en" => "English for America region",
    "US-fr" => "French for America region",
    "US-es" => "Spanish for America region",
    "US-pt" => "Portuguese for America region",
    "EU-en" => "English for Europe region",
    "EU-fr" => "French for Europe region",
    "EU-de" => "German for Europe region",
    "EU-it" => "Italian for Europe region",
    "EU-es" => "Spanish for Europe region",
    "EU-nl" => "Dutch for Europe region",
    "EU-pt" => "Portuguese for Europe region",
    "EU-ru" => "Russian for Europe region",
    "CN-zh" => "Chinese for China region",
    "KR-ko" => "Korean for Korea region",
    "TW-zh" => "Chinese for Taiwan region",
  }
});

impl DecodingTable {
  pub fn builtin() -> Self {
    Self {
      entries: BUILTIN_ENTRIES.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect(),
    }
  }

  pub fn from_entries(entries: IndexMap<String, String>) -> Self { Self { entries } }

  /// Later entries override the existing ones with the same key.
  pub fn extend(&mut self, entries: IndexMap<String, String>) { self.entries.extend(entries); }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn get(&self, key: &str) -> Option<&str> { self.entries.get(key).map(String::as_str) }

  pub fn describe(&self, replacement: &ReplacementEntry) -> &str {
    match self.get(&replacement.decoding_key()) {
      Some(description) => description,
      None => {
        debug!(
          "No description for region {:?} locale {:?}, leaving it blank",
          replacement.region_id, replacement.locale_id,
        );
        ""
      }
    }
  }
}
