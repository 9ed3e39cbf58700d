use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io;
use std::path::Path;

pub const DEFAULT_INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonStyle {
  Pretty,
  Compact,
}

impl Default for JsonStyle {
  #[inline(always)]
  fn default() -> Self { Self::Pretty }
}

pub fn read_file<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<T> {
  let bytes = fs::read(path)?;
  let value = serde_json::from_slice(&bytes)?;
  Ok(value)
}

/// Serializes the value into a byte buffer terminated with a newline, so that
/// generated files are stable and diff-friendly.
pub fn to_vec<T: serde::Serialize + ?Sized>(value: &T, style: JsonStyle) -> io::Result<Vec<u8>> {
  let mut bytes = Vec::new();
  match style {
    JsonStyle::Pretty => {
      let formatter = PrettyFormatter::with_indent(DEFAULT_INDENT.as_bytes());
      let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, formatter);
      value.serialize(&mut serializer)?;
    }
    JsonStyle::Compact => {
      serde_json::to_writer(&mut bytes, value)?;
    }
  }
  bytes.push(b'\n');
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_to_vec_styles() {
    let value = serde_json::json!([{ "lang": "German", "dir": "/data/de" }]);
    let pretty = String::from_utf8(to_vec(&value, JsonStyle::Pretty).unwrap()).unwrap();
    assert_eq!(pretty, "[\n  {\n    \"lang\": \"German\",\n    \"dir\": \"/data/de\"\n  }\n]\n");
    let compact = String::from_utf8(to_vec(&value, JsonStyle::Compact).unwrap()).unwrap();
    assert_eq!(compact, "[{\"lang\":\"German\",\"dir\":\"/data/de\"}]\n");
  }
}
