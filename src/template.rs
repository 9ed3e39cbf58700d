//! Placeholder substitution for the configuration templates. This is not a
//! general templating language: a template is cut into a static preamble and
//! a per-item body at fixed marker strings, and the body is instantiated once
//! per item by replacing a closed set of `{%token%}` placeholders.

use crate::impl_prelude::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const CONFIG_MARKER: &str = ";CONFIG";
pub const LANGUAGES_MARKER: &str = ";LANGUAGES";
pub const SECTION_HEADER_MARKER: &str = "[*{%language_name%}]";

const TOKEN_START: &str = "{%";
const TOKEN_END: &str = "%}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
  Name,
  Id,
  Url,
  DownloadUrl,
  Lang,
  Path,
  LanguageName,
}

impl Placeholder {
  pub const ALL: &'static [Self] = &[
    Self::Name,
    Self::Id,
    Self::Url,
    Self::DownloadUrl,
    Self::Lang,
    Self::Path,
    Self::LanguageName,
  ];

  /// The identifier between the `{%` and `%}` delimiters.
  pub fn key(self) -> &'static str {
    match self {
      Self::Name => "name",
      Self::Id => "id",
      Self::Url => "url",
      Self::DownloadUrl => "download_url",
      Self::Lang => "lang",
      Self::Path => "path",
      Self::LanguageName => "language_name",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|placeholder| placeholder.key() == key)
  }
}

pub type FieldValues<'a> = IndexMap<Placeholder, &'a str>;

/// Replaces every recognized placeholder which has a value in `values`.
/// Unknown tokens and placeholders without a value are copied verbatim. The
/// input is scanned once, so substituted values are never re-examined.
pub fn instantiate(body: &str, values: &FieldValues) -> String {
  let mut result = String::with_capacity(body.len());
  let mut rest = body;
  while let Some(start) = rest.find(TOKEN_START) {
    let after_start = &rest[start + TOKEN_START.len()..];
    let end = match after_start.find(TOKEN_END) {
      Some(end) => end,
      None => break,
    };
    let key = &after_start[..end];
    match Placeholder::from_key(key).and_then(|placeholder| values.get(&placeholder)) {
      Some(value) => {
        result.push_str(&rest[..start]);
        result.push_str(value);
        rest = &after_start[end + TOKEN_END.len()..];
      }
      None => {
        // Keep the opening delimiter and continue right after it, the token
        // may still contain the start of a real placeholder.
        result.push_str(&rest[..start + TOKEN_START.len()]);
        rest = after_start;
      }
    }
  }
  result.push_str(rest);
  result
}

/// Splits at the first occurrence of `marker`. The marker itself belongs to
/// neither half, so `before + marker + after` always gives back the input.
pub fn split_at_marker<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
  let index = text.find(marker)?;
  Some((&text[..index], &text[index + marker.len()..]))
}

/// Like [`split_at_marker`], but drops the whole line the marker was found on.
fn split_at_marker_line<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
  let (before, after) = split_at_marker(text, marker)?;
  let line_start = before.rfind('\n').map_or(0, |i| i + 1);
  let line_end = after.find('\n').map_or(after.len(), |i| i + 1);
  Some((&before[..line_start], &after[line_end..]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateFlavor {
  /// The preamble sits between a `;CONFIG` line and a `;LANGUAGES` line, the
  /// per-item body follows the latter.
  LineMarkers,
  /// The preamble is everything before the first `[*{%language_name%}]`
  /// section header, the header and everything after it is the body.
  SectionHeader,
}

impl TemplateFlavor {
  pub const ALL: &'static [Self] = &[Self::LineMarkers, Self::SectionHeader];

  pub fn id(self) -> &'static str {
    match self {
      Self::LineMarkers => "line_markers",
      Self::SectionHeader => "section_header",
    }
  }
}

impl Default for TemplateFlavor {
  fn default() -> Self { Self::LineMarkers }
}

impl FromStr for TemplateFlavor {
  type Err = AnyError;
  fn from_str(s: &str) -> AnyResult<Self> {
    Self::ALL
      .iter()
      .copied()
      .find(|flavor| flavor.id() == s)
      .ok_or_else(|| format_err!("Unknown template flavor: {:?}", s))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  pub preamble: String,
  pub body: String,
}

impl Template {
  /// A template without the required markers (or with nothing to repeat per
  /// item) is a configuration error, there is no sensible fallback.
  pub fn parse(text: &str, flavor: TemplateFlavor) -> AnyResult<Self> {
    let (preamble, body) = match flavor {
      TemplateFlavor::LineMarkers => {
        let (_, after_config) = split_at_marker_line(text, CONFIG_MARKER)
          .ok_or_else(|| format_err!("The template has no {:?} marker", CONFIG_MARKER))?;
        split_at_marker_line(after_config, LANGUAGES_MARKER).ok_or_else(|| {
          format_err!("The template has no {:?} marker after {:?}", LANGUAGES_MARKER, CONFIG_MARKER)
        })?
      }
      TemplateFlavor::SectionHeader => {
        let (preamble, _) = split_at_marker(text, SECTION_HEADER_MARKER)
          .ok_or_else(|| format_err!("The template has no {:?} section", SECTION_HEADER_MARKER))?;
        (preamble, &text[preamble.len()..])
      }
    };
    ensure!(!body.trim().is_empty(), "The per-language section of the template is empty");
    Ok(Self { preamble: preamble.to_owned(), body: body.to_owned() })
  }

  pub fn instantiate(&self, values: &FieldValues) -> String { instantiate(&self.body, values) }

  /// Glues the preamble, an optional header comment and the instantiated
  /// bodies into one document. Bodies are separated by a blank line and the
  /// document always ends with exactly one newline.
  pub fn render(&self, header_comment: Option<&str>, bodies: &[String]) -> String {
    let mut out = String::new();
    let preamble = self.preamble.trim_end_matches(&['\r', '\n'][..]);
    if !preamble.is_empty() {
      out.push_str(preamble);
      out.push('\n');
    }
    if let Some(header_comment) = header_comment {
      out.push_str(header_comment.trim_end_matches(&['\r', '\n'][..]));
      out.push('\n');
    }
    for (i, body) in bodies.iter().enumerate() {
      if i > 0 {
        out.push('\n');
      }
      out.push_str(body.trim_end_matches(&['\r', '\n'][..]));
      out.push('\n');
    }
    out
  }
}
