//! The older way of producing the distributable archives: instead of rendering
//! the tree from the manifest, the prebuilt language packs attached to the
//! release are extracted and every `replaces_<region>` folder inside them is
//! turned into a `<region>.zip` next to it.

use crate::archive::{self, ArchiveFormat, ExcludeSet, PackedArchive};
use crate::config::RepoRef;
use crate::github::ReleaseSource;
use crate::impl_prelude::*;
use crate::layout::LegacyAssetName;
use crate::staleness::ReleaseAsset;
use crate::utils;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct RepackageOptions {
  pub target_dir: PathBuf,
  /// Only the assets whose lowercased name contains this are used, and the
  /// release is the newest one having such an asset.
  pub asset_filter: Option<String>,
  /// Subfolders to repackage in every language folder. All `replaces_*`
  /// subfolders when empty.
  pub folders: Vec<String>,
  pub capitalize: bool,
  pub excludes: ExcludeSet,
}

#[derive(Debug, Default)]
pub struct RepackageReport {
  pub release_tag: String,
  pub assets: Vec<String>,
  pub archives: Vec<PackedArchive>,
  /// Requested folders which didn't exist, as `<language>/<folder>`.
  pub missing_folders: Vec<String>,
}

fn matches_filter(asset: &ReleaseAsset, filter: Option<&str>) -> bool {
  match filter {
    Some(keyword) => asset.name.to_lowercase().contains(&keyword.to_lowercase()),
    None => true,
  }
}

pub fn repackage(
  source: &dyn ReleaseSource,
  upstream: &RepoRef,
  opts: &RepackageOptions,
) -> AnyResult<RepackageReport> {
  let release = match &opts.asset_filter {
    Some(keyword) => source
      .latest_release_with_asset(&upstream.owner, &upstream.repo, keyword)?
      .ok_or_else(|| {
        format_err!(
          "No release of {}/{} has an asset matching {:?}",
          upstream.owner,
          upstream.repo,
          keyword,
        )
      })?,
    None => source.latest_release(&upstream.owner, &upstream.repo)?,
  };
  info!("Repackaging the release {:?}", release.tag);

  let mut downloaded = Vec::new();
  let filter = opts.asset_filter.as_deref();
  for asset in release.assets.iter().filter(|a| matches_filter(a, filter)) {
    ensure!(
      utils::is_safe_file_name(&asset.name),
      "Refusing to save an asset named {:?}",
      asset.name,
    );
    let bytes = source
      .download(&asset.download_url)
      .with_context(|| format!("Failed to download the asset {:?}", asset.name))?;
    downloaded.push((asset, bytes));
  }
  ensure!(!downloaded.is_empty(), "The release {:?} has no matching assets", release.tag);

  utils::recreate_dir(&opts.target_dir)
    .with_context(|| format!("Failed to recreate the directory {:?}", opts.target_dir))?;
  let mut report =
    RepackageReport { release_tag: release.tag.clone(), ..RepackageReport::default() };

  for (asset, bytes) in downloaded {
    let asset_path = opts.target_dir.join(&asset.name);
    fs::write(&asset_path, &bytes)
      .with_context(|| format!("Failed to write file {:?}", asset_path))?;
    report.assets.push(asset.name.clone());
    let format = match ArchiveFormat::detect(&asset.name) {
      Some((format, _)) => format,
      None => {
        warn!("The asset {:?} is not an archive, leaving it as is", asset.name);
        continue;
      }
    };
    let extracted = format.unpack(&asset_path, &opts.target_dir)?;
    debug!("Extracted {} files from {:?}", extracted.len(), asset.name);
    fs::remove_file(&asset_path).with_context(|| format!("Failed to delete {:?}", asset_path))?;
    rename_extracted_folder(&opts.target_dir, &asset.name, opts.capitalize)?;
  }

  for language_dir in list_subdirs(&opts.target_dir)? {
    let (archives, missing) =
      repackage_replacements(&language_dir, &opts.folders, &opts.excludes)?;
    report.archives.extend(archives);
    let language = language_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    for folder in missing {
      report.missing_folders.push(utils::fast_concat(&[language, "/", &folder]));
    }
  }
  Ok(report)
}

fn rename_extracted_folder(
  target_dir: &Path,
  asset_name: &str,
  capitalize: bool,
) -> AnyResult<()> {
  let name = match LegacyAssetName::parse(asset_name, capitalize) {
    Some(name) => name,
    None => {
      info!("Can't derive a folder name from {:?}, skipping the rename", asset_name);
      return Ok(());
    }
  };
  let from = target_dir.join(&name.extracted_folder);
  let to = target_dir.join(&name.canonical_folder);
  if !from.is_dir() {
    warn!("The asset {:?} didn't extract into {:?}, skipping the rename", asset_name, from);
    return Ok(());
  }
  if to.exists() {
    bail!("Can't rename {:?} to {:?}, the destination already exists", from, to);
  }
  fs::rename(&from, &to).with_context(|| format!("Failed to rename {:?} to {:?}", from, to))?;
  info!("Renamed {:?} to {:?}", name.extracted_folder, name.canonical_folder);
  Ok(())
}

fn list_subdirs(dir: &Path) -> AnyResult<Vec<PathBuf>> {
  let mut subdirs = Vec::new();
  for entry in fs::read_dir(dir).with_context(|| format!("Failed to list directory {:?}", dir))? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      subdirs.push(entry.path());
    }
  }
  subdirs.sort();
  Ok(subdirs)
}

/// Archives the `replaces_*` subfolders of a language folder into sibling
/// zips and deletes the folders. Returns the archives and the names of the
/// requested folders which weren't there.
pub fn repackage_replacements(
  language_dir: &Path,
  folders: &[String],
  excludes: &ExcludeSet,
) -> AnyResult<(Vec<PackedArchive>, Vec<String>)> {
  let folders: Vec<String> = if folders.is_empty() {
    list_subdirs(language_dir)?
      .iter()
      .filter_map(|path| path.file_name()?.to_str())
      .filter(|name| name.starts_with(archive::REPLACES_PREFIX))
      .map(ToOwned::to_owned)
      .collect()
  } else {
    folders.to_vec()
  };

  let mut archives = Vec::with_capacity(folders.len());
  let mut missing = Vec::new();
  for folder in folders {
    let folder_path = language_dir.join(&folder);
    if !utils::is_safe_file_name(&folder) || !folder_path.is_dir() {
      warn!("Folder not found: {:?}", folder_path);
      missing.push(folder);
      continue;
    }
    let archive_name = archive::archive_file_name_for(&folder_path)
      .ok_or_else(|| format_err!("Can't derive an archive name for {:?}", folder_path))?;
    archives.push(archive::pack(&folder_path, &language_dir.join(archive_name), excludes)?);
    fs::remove_dir_all(&folder_path)
      .with_context(|| format!("Failed to delete the directory {:?}", folder_path))?;
  }
  Ok((archives, missing))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::archive::tests::tar_gz;
  use crate::layout::GeneratedTree;
  use crate::pipeline::tests::{release_at, FakeSource};
  use pretty_assertions::assert_eq;
  use time::macros::datetime;

  fn zipped(tmp: &Path, files: &[&str]) -> Vec<u8> {
    let root = tmp.join("zip-src");
    let mut tree = GeneratedTree::new();
    for file in files {
      tree.insert((*file).to_owned(), file.as_bytes().to_vec()).unwrap();
    }
    tree.write_to(&root).unwrap();
    let archive_path = tmp.join("asset.zip");
    archive::pack(&root, &archive_path, &ExcludeSet::default()).unwrap();
    fs::read(&archive_path).unwrap()
  }

  fn source(tmp: &Path) -> FakeSource {
    let mut source = FakeSource {
      releases: vec![release_at(datetime!(2024-03-01 12:00 UTC), &[
        ("NX_ukrainian_FW17.zip", "http://x/uk.zip"),
        ("german_EU_de.zip", "http://x/de.zip"),
      ])],
      ..FakeSource::default()
    };
    source.downloads.insert(
      "http://x/uk.zip".to_owned(),
      zipped(tmp, &[
        "ukrainian_FW17/readme.txt",
        "ukrainian_FW17/replaces_ru-EU/romfs/a.txt",
        "ukrainian_FW17/replaces_en-US/b.txt",
      ]),
    );
    source
  }

  fn upstream() -> RepoRef { RepoRef::parse("NX-Family/NX-Translation").unwrap() }

  #[test]
  fn test_repackage_all_replacements() {
    let tmp = tempfile::tempdir().unwrap();
    let source = source(tmp.path());
    let opts = RepackageOptions {
      target_dir: tmp.path().join("out"),
      asset_filter: Some("Ukrainian".to_owned()),
      capitalize: true,
      ..RepackageOptions::default()
    };
    let report = repackage(&source, &upstream(), &opts).unwrap();

    assert_eq!(report.assets, ["NX_ukrainian_FW17.zip"]);
    assert_eq!(*source.downloaded.borrow(), ["http://x/uk.zip"]);
    let tree = GeneratedTree::read_from(&opts.target_dir).unwrap();
    assert_eq!(tree.paths().collect::<Vec<_>>(), [
      "Ukrainian/en-US.zip",
      "Ukrainian/readme.txt",
      "Ukrainian/ru-EU.zip",
    ]);
    assert_eq!(report.archives.len(), 2);
    assert_eq!(report.archives[0].entries, ["b.txt"]);
    assert_eq!(report.archives[1].entries, ["romfs/a.txt"]);
    assert!(report.missing_folders.is_empty());
  }

  #[test]
  fn test_repackage_selected_folders() {
    let tmp = tempfile::tempdir().unwrap();
    let source = source(tmp.path());
    let opts = RepackageOptions {
      target_dir: tmp.path().join("out"),
      asset_filter: Some("ukrainian".to_owned()),
      folders: vec!["replaces_ru-EU".to_owned(), "replaces_en-EU".to_owned()],
      capitalize: false,
      ..RepackageOptions::default()
    };
    let report = repackage(&source, &upstream(), &opts).unwrap();

    assert_eq!(report.missing_folders, ["ukrainian/replaces_en-EU"]);
    assert!(opts.target_dir.join("ukrainian/ru-EU.zip").is_file());
    assert!(!opts.target_dir.join("ukrainian/replaces_ru-EU").exists());
    assert!(opts.target_dir.join("ukrainian/replaces_en-US/b.txt").is_file());
  }

  #[test]
  fn test_repackage_failed_download_keeps_target() {
    let tmp = tempfile::tempdir().unwrap();
    let source = source(tmp.path());
    let target_dir = tmp.path().join("out");
    fs::create_dir(&target_dir).unwrap();
    fs::write(target_dir.join("previous.txt"), b"kept").unwrap();

    // The German asset has no download registered.
    let opts = RepackageOptions { target_dir: target_dir.clone(), ..RepackageOptions::default() };
    assert!(repackage(&source, &upstream(), &opts).is_err());
    assert!(target_dir.join("previous.txt").is_file());

    let opts = RepackageOptions {
      target_dir,
      asset_filter: Some("klingon".to_owned()),
      ..RepackageOptions::default()
    };
    assert!(repackage(&source, &upstream(), &opts).is_err());
  }

  #[test]
  fn test_repackage_tar_gz_assets() {
    let tmp = tempfile::tempdir().unwrap();
    let mut source = FakeSource {
      releases: vec![release_at(datetime!(2024-03-01 12:00 UTC), &[
        ("NX_ukrainian_FW17.tar.gz", "http://x/uk.tar.gz"),
        ("notes.txt", "http://x/notes.txt"),
      ])],
      ..FakeSource::default()
    };
    source.downloads.insert(
      "http://x/uk.tar.gz".to_owned(),
      tar_gz(&[("ukrainian_FW17/replaces_en-EU/c.txt", &b"c"[..])]),
    );
    source.downloads.insert("http://x/notes.txt".to_owned(), b"notes".to_vec());
    let opts = RepackageOptions {
      target_dir: tmp.path().join("out"),
      capitalize: true,
      ..RepackageOptions::default()
    };
    let report = repackage(&source, &upstream(), &opts).unwrap();

    assert_eq!(report.assets, ["NX_ukrainian_FW17.tar.gz", "notes.txt"]);
    let tree = GeneratedTree::read_from(&opts.target_dir).unwrap();
    assert_eq!(tree.paths().collect::<Vec<_>>(), ["Ukrainian/en-EU.zip", "notes.txt"]);
    assert_eq!(report.archives[0].entries, ["c.txt"]);
  }

  #[test]
  fn test_rename_is_skipped_for_short_names() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir(tmp.path().join("ukrainian")).unwrap();
    rename_extracted_folder(tmp.path(), "ukrainian.zip", true).unwrap();
    assert!(tmp.path().join("ukrainian").is_dir());
  }
}
