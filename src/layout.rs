//! Derivation of the generated directory tree. Everything here works on an
//! in-memory [`GeneratedTree`], touching the disk is left to
//! [`GeneratedTree::write_to`].

use crate::archive::ArchiveFormat;
use crate::decoding::DecodingTable;
use crate::impl_prelude::*;
use crate::manifest::{IdOrdering, LanguageEntry, LanguageManifest};
use crate::template::{FieldValues, Placeholder, Template};
use crate::utils;
use crate::utils::json::{self, JsonStyle};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const LANGS_DIR_NAME: &str = "langs";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.ini";

/// Files keyed by their `/`-separated path relative to the tree root. The
/// map is ordered, which makes every traversal of the tree deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedTree {
  files: BTreeMap<String, Vec<u8>>,
}

impl GeneratedTree {
  pub fn new() -> Self { Self { files: BTreeMap::new() } }

  pub fn insert(&mut self, path: String, content: Vec<u8>) -> AnyResult<()> {
    ensure!(
      path.split('/').all(utils::is_safe_file_name),
      "Refusing to put a file at a suspicious path {:?}",
      path,
    );
    ensure!(!self.files.contains_key(&path), "File {:?} was generated twice", path);
    for (i, _) in path.match_indices('/') {
      let parent = &path[..i];
      ensure!(
        !self.files.contains_key(parent),
        "File {:?} would have to be put inside the file {:?}",
        path,
        parent,
      );
    }
    let dir_prefix = utils::fast_concat(&[&path, "/"]);
    if let Some((nested, _)) = self.files.range(dir_prefix.clone()..).next() {
      ensure!(
        !nested.starts_with(&dir_prefix),
        "File {:?} clashes with the directory holding {:?}",
        path,
        nested,
      );
    }
    self.files.insert(path, content);
    Ok(())
  }

  pub fn get(&self, path: &str) -> Option<&[u8]> { self.files.get(path).map(Vec::as_slice) }

  pub fn paths(&self) -> impl Iterator<Item = &str> { self.files.keys().map(String::as_str) }

  pub fn len(&self) -> usize { self.files.len() }

  pub fn is_empty(&self) -> bool { self.files.is_empty() }

  /// Replaces whatever was at `root` with the contents of this tree.
  pub fn write_to(&self, root: &Path) -> AnyResult<()> {
    utils::recreate_dir(root)
      .with_context(|| format!("Failed to recreate the output directory {:?}", root))?;
    for (rel_path, content) in &self.files {
      let path = root.join(rel_path);
      if let Some(parent) = path.parent() {
        utils::create_dir_recursively(parent)
          .with_context(|| format!("Failed to create directory {:?}", parent))?;
      }
      fs::write(&path, content).with_context(|| format!("Failed to write file {:?}", path))?;
      trace!("Written {:?}", path);
    }
    Ok(())
  }

  /// Loads every regular file under `root`, the inverse of
  /// [`GeneratedTree::write_to`].
  pub fn read_from(root: &Path) -> AnyResult<Self> {
    let mut tree = Self::new();
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
      let entry = entry.with_context(|| format!("Failed to list all files in dir {:?}", root))?;
      if !entry.file_type().is_file() {
        continue;
      }
      let rel_path = entry.path().strip_prefix(root)?;
      let rel_path = utils::to_slash_path(rel_path)
        .ok_or_else(|| format_err!("Non-UTF-8 or non-relative path {:?}", rel_path))?;
      let content =
        fs::read(entry.path()).with_context(|| format!("Failed to read {:?}", entry.path()))?;
      tree.insert(rel_path, content)?;
    }
    Ok(tree)
  }
}

#[derive(Debug, Clone)]
pub struct ConfigLayout {
  pub template: Template,
  pub file_name: String,
  /// Put between the preamble and the per-entry sections, usually a comment
  /// asking the user to enable exactly one of them.
  pub header_comment: Option<String>,
  /// When set, an additional document with the sections of all languages in
  /// id order is put at the tree root under this name.
  pub combined_file_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LangsLayout {
  /// When set, every descriptor starts with a `{"lang": <placeholder>}`
  /// record, for consumers which need a "choose a language" first entry.
  pub placeholder: Option<String>,
  pub style: JsonStyle,
}

#[derive(Debug, Clone)]
pub struct LayoutOptions {
  pub ordering: IdOrdering,
  pub config: Option<ConfigLayout>,
  pub langs: Option<LangsLayout>,
}

#[derive(Debug, Serialize)]
struct LangDescriptorEntry<'a> {
  lang: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  dir: Option<&'a str>,
}

pub fn generate(
  manifest: &LanguageManifest,
  table: &DecodingTable,
  opts: &LayoutOptions,
) -> AnyResult<GeneratedTree> {
  ensure!(
    opts.config.is_some() || opts.langs.is_some(),
    "Nothing to generate, neither config files nor language descriptors were requested",
  );
  if let Some(config) = &opts.config {
    for file_name in std::iter::once(&config.file_name).chain(&config.combined_file_name) {
      ensure!(utils::is_safe_file_name(file_name), "Invalid config file name {:?}", file_name);
    }
  }

  let languages = manifest.sorted_languages(opts.ordering);
  let mut tree = GeneratedTree::new();
  for &language in &languages {
    if let Some(config) = &opts.config {
      let bodies = render_config_bodies(language, table, config);
      let content = config.template.render(config.header_comment.as_deref(), &bodies);
      tree.insert(utils::fast_concat(&[&language.name, "/", &config.file_name]), content.into())?;
    }
    if let Some(langs) = &opts.langs {
      let content = render_langs_descriptor(language, table, langs)
        .with_context(|| format!("Failed to serialize the descriptor of {:?}", language.name))?;
      tree.insert(utils::fast_concat(&[LANGS_DIR_NAME, "/", &language.name, ".json"]), content)?;
    }
  }

  if let Some(config) = &opts.config {
    if let Some(combined_file_name) = &config.combined_file_name {
      let bodies: Vec<String> = languages
        .iter()
        .flat_map(|language| render_config_bodies(language, table, config))
        .collect();
      let content = config.template.render(config.header_comment.as_deref(), &bodies);
      tree.insert(combined_file_name.clone(), content.into())?;
    }
  }

  Ok(tree)
}

pub fn field_values<'a>(
  language: &'a LanguageEntry,
  description: &'a str,
  path: &'a str,
) -> FieldValues<'a> {
  indexmap! {
    Placeholder::Name => language.name.as_str(),
    Placeholder::Id => language.id.as_str(),
    Placeholder::Url => language.download_url.as_str(),
    Placeholder::DownloadUrl => language.download_url.as_str(),
    Placeholder::Lang => description,
    Placeholder::LanguageName => description,
    Placeholder::Path => path,
  }
}

/// One instantiated template body per replacement entry, in manifest order.
pub fn render_config_bodies(
  language: &LanguageEntry,
  table: &DecodingTable,
  config: &ConfigLayout,
) -> Vec<String> {
  language
    .replaces
    .iter()
    .map(|replacement| {
      let description = table.describe(replacement);
      config.template.instantiate(&field_values(language, description, &replacement.path))
    })
    .collect()
}

pub fn render_langs_descriptor(
  language: &LanguageEntry,
  table: &DecodingTable,
  langs: &LangsLayout,
) -> AnyResult<Vec<u8>> {
  let mut entries = Vec::with_capacity(language.replaces.len() + 1);
  if let Some(placeholder) = &langs.placeholder {
    entries.push(LangDescriptorEntry { lang: placeholder, dir: None });
  }
  for replacement in &language.replaces {
    entries.push(LangDescriptorEntry {
      lang: table.describe(replacement),
      dir: Some(&replacement.path),
    });
  }
  Ok(json::to_vec(&entries, langs.style)?)
}

/// Folder names of the extracted release assets, derived from asset file
/// names like `ukrainian_EU_ru.zip` or `ukrainian_EU_ru.tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAssetName {
  /// The folder the asset extracts into, `EU_ru` in the example.
  pub extracted_folder: String,
  /// The name the folder is renamed to, `EU` (or `Eu` when capitalizing).
  pub canonical_folder: String,
}

impl LegacyAssetName {
  /// Returns `None` unless the name has at least three `_`-separated parts,
  /// anything shorter can't be renamed and is kept as is.
  pub fn parse(asset_file_name: &str, capitalize: bool) -> Option<Self> {
    let stem = ArchiveFormat::detect(asset_file_name).map_or(asset_file_name, |(_, stem)| stem);
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 || parts[1].is_empty() {
      return None;
    }
    let canonical_folder =
      if capitalize { utils::capitalize_first(parts[1]) } else { parts[1].to_owned() };
    Some(Self {
      extracted_folder: utils::fast_concat(&[parts[1], "_", parts[2]]),
      canonical_folder,
    })
  }
}
