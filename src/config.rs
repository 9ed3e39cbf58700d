//! The description of a sync job. It is read from an optional JSON file and
//! then patched with command-line options, every field has a default.

use crate::archive::{self, ExcludeSet};
use crate::decoding::DecodingTable;
use crate::github;
use crate::impl_prelude::*;
use crate::layout::{self, ConfigLayout, LangsLayout, LayoutOptions};
use crate::manifest::IdOrdering;
use crate::template::{Template, TemplateFlavor};
use crate::utils;
use crate::utils::json::{self, JsonStyle};

use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST_ASSET: &str = "languages.json";
pub const DEFAULT_HEADER_COMMENT: &str =
  "; Only one of the sections below may be active, comment out the rest.";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoRef {
  pub owner: String,
  pub repo: String,
}

impl RepoRef {
  /// Parses the `owner/repo` notation.
  pub fn parse(s: &str) -> AnyResult<Self> {
    match s.split_once('/') {
      Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
        Ok(Self { owner: owner.to_owned(), repo: repo.to_owned() })
      }
      _ => bail!("Expected a repository in the form of OWNER/REPO, got {:?}", s),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
  pub api_base_url: String,
  pub upstream: RepoRef,
  /// The repository whose latest commit is the staleness reference. Ignored
  /// when a last-run marker is configured.
  pub mirror: Option<RepoRef>,
  /// A file holding the time of the last successful run, rewritten after
  /// every one of them. When set it is the staleness reference, even though
  /// `mirror` has a default.
  pub last_run_marker: Option<PathBuf>,

  pub manifest_url: Option<String>,
  pub manifest_asset: String,
  pub work_dir: PathBuf,

  pub output_dir: PathBuf,
  pub archive_dir: PathBuf,
  pub archive_name: Option<String>,
  pub per_language_archives: bool,
  pub exclude: Vec<String>,

  pub config_template: Option<PathBuf>,
  pub template_flavor: TemplateFlavor,
  pub config_file_name: String,
  pub combined_file_name: Option<String>,
  pub header_comment: Option<String>,
  pub langs: bool,
  pub langs_placeholder: Option<String>,
  pub compact_json: bool,
  pub id_ordering: IdOrdering,

  pub decoding_table: IndexMap<String, String>,
  pub replace_decoding_table: bool,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      api_base_url: github::DEFAULT_API_BASE_URL.to_owned(),
      upstream: RepoRef { owner: "NX-Family".to_owned(), repo: "NX-Translation".to_owned() },
      mirror: Some(RepoRef {
        owner: "rashevskyv".to_owned(),
        repo: "switch-translations-mirrors".to_owned(),
      }),
      last_run_marker: None,

      manifest_url: None,
      manifest_asset: DEFAULT_MANIFEST_ASSET.to_owned(),
      work_dir: PathBuf::from("work"),

      output_dir: PathBuf::from("translations"),
      archive_dir: PathBuf::from("dist"),
      archive_name: None,
      per_language_archives: false,
      exclude: Vec::new(),

      config_template: None,
      template_flavor: TemplateFlavor::default(),
      config_file_name: layout::DEFAULT_CONFIG_FILE_NAME.to_owned(),
      combined_file_name: None,
      header_comment: None,
      langs: false,
      langs_placeholder: None,
      compact_json: false,
      id_ordering: IdOrdering::default(),

      decoding_table: IndexMap::new(),
      replace_decoding_table: false,
    }
  }
}

impl SyncConfig {
  pub fn load(path: &Path) -> AnyResult<Self> {
    let config: Self = json::read_file(path)
      .with_context(|| format!("Failed to read the configuration from {:?}", path))?;
    Ok(config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new(""))))
  }

  /// Relative paths in a config file are relative to the file itself.
  fn resolve_relative_to(mut self, base_dir: &Path) -> Self {
    let resolve = |p: &mut PathBuf| {
      if p.is_relative() {
        *p = base_dir.join(&*p);
      }
    };
    resolve(&mut self.work_dir);
    resolve(&mut self.output_dir);
    resolve(&mut self.archive_dir);
    if let Some(p) = &mut self.last_run_marker {
      resolve(p);
    }
    if let Some(p) = &mut self.config_template {
      resolve(p);
    }
    self
  }

  pub fn decoding_table(&self) -> DecodingTable {
    if self.replace_decoding_table {
      return DecodingTable::from_entries(self.decoding_table.clone());
    }
    let mut table = DecodingTable::builtin();
    table.extend(self.decoding_table.clone());
    table
  }

  pub fn exclude_set(&self) -> AnyResult<ExcludeSet> { ExcludeSet::new(&self.exclude) }

  /// Loads the template and assembles the layout options. Fails when the
  /// template is unreadable or malformed, before anything is written.
  pub fn layout_options(&self) -> AnyResult<LayoutOptions> {
    let config = match &self.config_template {
      Some(template_path) => {
        let text = fs::read_to_string(template_path)
          .with_context(|| format!("Failed to read the template {:?}", template_path))?;
        let template = Template::parse(&text, self.template_flavor)
          .with_context(|| format!("Failed to parse the template {:?}", template_path))?;
        Some(ConfigLayout {
          template,
          file_name: self.config_file_name.clone(),
          header_comment: self.header_comment.clone(),
          combined_file_name: self.combined_file_name.clone(),
        })
      }
      None => None,
    };
    let langs = if self.langs {
      Some(LangsLayout {
        placeholder: self.langs_placeholder.clone(),
        style: if self.compact_json { JsonStyle::Compact } else { JsonStyle::Pretty },
      })
    } else {
      None
    };
    ensure!(
      config.is_some() || langs.is_some(),
      "Neither a config template nor language descriptors are configured, nothing to generate",
    );
    Ok(LayoutOptions { ordering: self.id_ordering, config, langs })
  }

  pub fn archive_file_name(&self) -> AnyResult<String> {
    match &self.archive_name {
      Some(name) => {
        ensure!(utils::is_safe_file_name(name), "Invalid archive name {:?}", name);
        Ok(utils::fast_concat(&[name, ".", archive::ARCHIVE_EXTENSION]))
      }
      None => archive::archive_file_name_for(&self.output_dir).ok_or_else(|| {
        format_err!("Can't derive an archive name from {:?}, set one explicitly", self.output_dir)
      }),
    }
  }

  /// Where the downloaded manifest is kept, inside the work directory.
  pub fn saved_manifest_path(&self) -> AnyResult<PathBuf> {
    ensure!(
      utils::is_safe_file_name(&self.manifest_asset),
      "Invalid manifest asset name {:?}",
      self.manifest_asset,
    );
    Ok(self.work_dir.join(&self.manifest_asset))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_repo_ref_parse() {
    assert_eq!(RepoRef::parse("NX-Family/NX-Translation").unwrap(), RepoRef {
      owner: "NX-Family".to_owned(),
      repo: "NX-Translation".to_owned(),
    });
    assert!(RepoRef::parse("NX-Family").is_err());
    assert!(RepoRef::parse("/repo").is_err());
    assert!(RepoRef::parse("a/b/c").is_err());
  }

  #[test]
  fn test_load_with_defaults_and_relative_paths() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sync.json");
    fs::write(
      &path,
      r#"{
        "upstream": {"owner": "me", "repo": "packs"},
        "mirror": null,
        "last_run_marker": "state/last_run",
        "config_template": "template.ini",
        "id_ordering": "lexicographic",
        "template_flavor": "section_header",
        "decoding_table": {"EU-uk": "Ukrainian for Europe region"}
      }"#,
    )
    .unwrap();
    let config = SyncConfig::load(&path).unwrap();
    assert_eq!(config.upstream.repo, "packs");
    assert_eq!(config.mirror, None);
    assert_eq!(config.last_run_marker, Some(tmp.path().join("state/last_run")));
    assert_eq!(config.config_template, Some(tmp.path().join("template.ini")));
    assert_eq!(config.output_dir, tmp.path().join("translations"));
    assert_eq!(config.id_ordering, IdOrdering::Lexicographic);
    assert_eq!(config.template_flavor, TemplateFlavor::SectionHeader);
    assert_eq!(config.manifest_asset, DEFAULT_MANIFEST_ASSET);

    let table = config.decoding_table();
    assert_eq!(table.get("EU-uk"), Some("Ukrainian for Europe region"));
    assert_eq!(table.get("EU-de"), Some("German for Europe region"));
  }

  #[test]
  fn test_replace_decoding_table() {
    let config = SyncConfig {
      decoding_table: indexmap! { "EU-uk".to_owned() => "Ukrainian".to_owned() },
      replace_decoding_table: true,
      ..SyncConfig::default()
    };
    let table = config.decoding_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("EU-de"), None);
  }

  #[test]
  fn test_file_names_must_stay_in_their_directories() {
    let config = SyncConfig { archive_name: Some("all".to_owned()), ..SyncConfig::default() };
    assert_eq!(config.archive_file_name().unwrap(), "all.zip");
    assert_eq!(config.saved_manifest_path().unwrap(), Path::new("work/languages.json"));

    let config = SyncConfig { archive_name: Some("../all".to_owned()), ..SyncConfig::default() };
    assert!(config.archive_file_name().is_err());
    let config = SyncConfig { manifest_asset: "../../etc/x.json".to_owned(), ..config };
    assert!(config.saved_manifest_path().is_err());
    let config = SyncConfig { manifest_asset: String::new(), ..config };
    assert!(config.saved_manifest_path().is_err());
  }

  #[test]
  fn test_load_rejects_unknown_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("sync.json");
    fs::write(&path, r#"{"output_directory": "x"}"#).unwrap();
    assert!(SyncConfig::load(&path).is_err());
  }

  #[test]
  fn test_layout_options() {
    let tmp = tempfile::tempdir().unwrap();
    let template_path = tmp.path().join("template.ini");
    fs::write(&template_path, ";CONFIG\nbase=1\n;LANGUAGES\n[{%id%}]\n").unwrap();

    assert!(SyncConfig::default().layout_options().is_err());

    let config =
      SyncConfig { config_template: Some(template_path.clone()), ..SyncConfig::default() };
    let opts = config.layout_options().unwrap();
    assert_eq!(opts.config.unwrap().template.preamble, "base=1\n");
    assert!(opts.langs.is_none());

    fs::write(&template_path, "no markers at all\n").unwrap();
    assert!(config.layout_options().is_err());

    let missing = SyncConfig {
      config_template: Some(tmp.path().join("missing.ini")),
      ..SyncConfig::default()
    };
    assert!(missing.layout_options().is_err());
  }

  #[test]
  fn test_archive_file_name() {
    let config =
      SyncConfig { output_dir: PathBuf::from("out/replaces_ru-EU"), ..SyncConfig::default() };
    assert_eq!(config.archive_file_name().unwrap(), "ru-EU.zip");
    let config = SyncConfig { archive_name: Some("packs".to_owned()), ..config };
    assert_eq!(config.archive_file_name().unwrap(), "packs.zip");
  }
}
