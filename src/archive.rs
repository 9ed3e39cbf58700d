//! Packing of generated directory trees into zip archives, and extraction of
//! zip archives and gzipped tarballs. Produced archives are reproducible:
//! entries are sorted by their relative path and all carry the same fixed
//! modification time.

use crate::impl_prelude::*;
use crate::utils;

use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Write};
use std::path::{Component as PathComponent, Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const REPLACES_PREFIX: &str = "replaces_";

/// Formats of the archives we can extract. Only zip archives are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Zip,
  TarGz,
}

impl ArchiveFormat {
  pub const ALL: &'static [Self] = &[Self::Zip, Self::TarGz];

  pub fn extensions(self) -> &'static [&'static str] {
    match self {
      Self::Zip => &[".zip"],
      Self::TarGz => &[".tar.gz", ".tgz"],
    }
  }

  /// Recognizes the format by the (case-insensitive) extension and returns
  /// it together with the name stripped of that extension.
  pub fn detect(file_name: &str) -> Option<(Self, &str)> {
    for &format in Self::ALL {
      for ext in format.extensions() {
        let stem_len = match file_name.len().checked_sub(ext.len()) {
          Some(len) => len,
          None => continue,
        };
        if stem_len > 0
          && file_name.is_char_boundary(stem_len)
          && file_name[stem_len..].eq_ignore_ascii_case(ext)
        {
          return Some((format, &file_name[..stem_len]));
        }
      }
    }
    None
  }

  pub fn unpack(self, archive_path: &Path, dest_dir: &Path) -> AnyResult<Vec<PathBuf>> {
    match self {
      Self::Zip => unpack(archive_path, dest_dir),
      Self::TarGz => unpack_tar_gz(archive_path, dest_dir),
    }
  }
}

/// Glob patterns matched against relative paths of files and each of their
/// parent directories, so that a pattern naming a directory excludes the
/// whole subtree under it.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
  patterns: Vec<glob::Pattern>,
}

impl ExcludeSet {
  pub fn new<S: AsRef<str>>(patterns: &[S]) -> AnyResult<Self> {
    let patterns = patterns
      .iter()
      .map(|p| {
        let p = p.as_ref().trim_end_matches('/');
        glob::Pattern::new(p).with_context(|| format!("Invalid exclusion pattern {:?}", p))
      })
      .collect::<AnyResult<Vec<_>>>()?;
    Ok(Self { patterns })
  }

  pub fn is_excluded(&self, rel_path: &str) -> bool {
    if self.patterns.is_empty() {
      return false;
    }
    let mut prefix_end = 0;
    loop {
      let next_separator = rel_path[prefix_end..].find('/').map(|i| prefix_end + i);
      let prefix = &rel_path[..next_separator.unwrap_or_else(|| rel_path.len())];
      if self.patterns.iter().any(|pattern| pattern.matches(prefix)) {
        return true;
      }
      match next_separator {
        Some(i) => prefix_end = i + 1,
        None => return false,
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
  pub source_dir: PathBuf,
  pub archive_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArchive {
  pub archive_path: PathBuf,
  pub entries: Vec<String>,
}

/// The archive name used for a generated folder: its own name without the
/// `replaces_` prefix the release assets use.
pub fn archive_file_name_for(source_dir: &Path) -> Option<String> {
  let dir_name = source_dir.file_name()?.to_str()?;
  let stem = dir_name.strip_prefix(REPLACES_PREFIX).unwrap_or(dir_name);
  if stem.is_empty() {
    return None;
  }
  Some(utils::fast_concat(&[stem, ".", ARCHIVE_EXTENSION]))
}

/// Lists the files under `root` which should go into an archive, as sorted
/// `/`-separated relative paths.
pub fn collect_entries(root: &Path, excludes: &ExcludeSet) -> AnyResult<Vec<String>> {
  let mut entries = Vec::new();
  for entry in walkdir::WalkDir::new(root).min_depth(1) {
    let entry = entry.with_context(|| format!("Failed to list all files in dir {:?}", root))?;
    if !entry.file_type().is_file() {
      continue;
    }
    let rel_path = entry.path().strip_prefix(root)?;
    let rel_path = utils::to_slash_path(rel_path)
      .ok_or_else(|| format_err!("Can't store the path {:?} in an archive", entry.path()))?;
    if excludes.is_excluded(&rel_path) {
      trace!("Excluded {:?}", rel_path);
      continue;
    }
    entries.push(rel_path);
  }
  entries.sort();
  Ok(entries)
}

pub fn pack(
  source_dir: &Path,
  archive_path: &Path,
  excludes: &ExcludeSet,
) -> AnyResult<PackedArchive> {
  ensure!(source_dir.is_dir(), "The directory {:?} to be archived doesn't exist", source_dir);

  let mut entries = collect_entries(source_dir, excludes)?;
  // The archive may be placed inside the directory it is made of.
  if let Ok(archive_rel_path) = archive_path.strip_prefix(source_dir) {
    if let Some(archive_rel_path) = utils::to_slash_path(archive_rel_path) {
      entries.retain(|e| *e != archive_rel_path);
    }
  }

  if utils::remove_file_if_exists(archive_path)
    .with_context(|| format!("Failed to delete the old archive {:?}", archive_path))?
  {
    debug!("Deleted the old archive {:?}", archive_path);
  }
  if let Some(parent) = archive_path.parent() {
    utils::create_dir_recursively(parent)
      .with_context(|| format!("Failed to create directory {:?}", parent))?;
  }

  let file = fs::File::create(archive_path)
    .with_context(|| format!("Failed to open file {:?} for writing", archive_path))?;
  let mut writer = ZipWriter::new(io::BufWriter::new(file));
  let options = FileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(zip::DateTime::default());

  for rel_path in &entries {
    let content = fs::read(source_dir.join(rel_path))
      .with_context(|| format!("Failed to read {:?} from {:?}", rel_path, source_dir))?;
    writer
      .start_file(rel_path.as_str(), options)
      .with_context(|| format!("Failed to add {:?} to {:?}", rel_path, archive_path))?;
    writer.write_all(&content)?;
  }
  let mut inner = writer.finish().with_context(|| format!("Failed to finish {:?}", archive_path))?;
  inner.flush()?;

  info!("Packed {} files from {:?} into {:?}", entries.len(), source_dir, archive_path);
  Ok(PackedArchive { archive_path: archive_path.to_owned(), entries })
}

/// Packs every target independently: a failed target is reported and the
/// remaining ones are still processed.
pub fn pack_all(targets: &[ArchiveTarget], excludes: &ExcludeSet) -> (Vec<PackedArchive>, usize) {
  let mut packed = Vec::with_capacity(targets.len());
  let mut errors_count = 0;
  for target in targets {
    match pack(&target.source_dir, &target.archive_path, excludes) {
      Ok(archive) => packed.push(archive),
      Err(e) => {
        report_error!(e.context(format!("Failed to create the archive {:?}", target.archive_path)));
        errors_count += 1;
      }
    }
  }
  (packed, errors_count)
}

/// Extracts all entries into `dest_dir`, returning the extracted files.
/// Entries which would end up outside of `dest_dir` are rejected.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> AnyResult<Vec<PathBuf>> {
  let file = fs::File::open(archive_path)
    .with_context(|| format!("Failed to open the archive {:?}", archive_path))?;
  let mut archive = ZipArchive::new(io::BufReader::new(file))
    .with_context(|| format!("{:?} is not a valid zip archive", archive_path))?;

  let mut extracted = Vec::with_capacity(archive.len());
  for i in 0..archive.len() {
    let mut entry = archive.by_index(i)?;
    let rel_path = match entry.enclosed_name() {
      Some(p) => p.to_owned(),
      None => bail!("The archive {:?} contains an unsafe path {:?}", archive_path, entry.name()),
    };
    let out_path = dest_dir.join(&rel_path);
    if entry.is_dir() {
      utils::create_dir_recursively(&out_path)
        .with_context(|| format!("Failed to create directory {:?}", out_path))?;
      continue;
    }
    if let Some(parent) = out_path.parent() {
      utils::create_dir_recursively(parent)
        .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let mut out_file = fs::File::create(&out_path)
      .with_context(|| format!("Failed to open file {:?} for writing", out_path))?;
    io::copy(&mut entry, &mut out_file)
      .with_context(|| format!("Failed to extract {:?}", rel_path))?;
    extracted.push(out_path);
  }
  Ok(extracted)
}

fn is_enclosed(rel_path: &Path) -> bool {
  let mut components = rel_path.components().peekable();
  components.peek().is_some()
    && components.all(|c| matches!(c, PathComponent::Normal(_) | PathComponent::CurDir))
}

/// Same as [`unpack`] for gzipped tarballs. Links are rejected along with
/// the entries leaving `dest_dir`.
pub fn unpack_tar_gz(archive_path: &Path, dest_dir: &Path) -> AnyResult<Vec<PathBuf>> {
  let file = fs::File::open(archive_path)
    .with_context(|| format!("Failed to open the archive {:?}", archive_path))?;
  let mut archive = tar::Archive::new(GzDecoder::new(io::BufReader::new(file)));
  utils::create_dir_recursively(dest_dir)
    .with_context(|| format!("Failed to create directory {:?}", dest_dir))?;

  let mut extracted = Vec::new();
  let entries = archive
    .entries()
    .with_context(|| format!("{:?} is not a valid tarball", archive_path))?;
  for entry in entries {
    let mut entry =
      entry.with_context(|| format!("Failed to read an entry of {:?}", archive_path))?;
    let rel_path = entry.path()?.into_owned();
    let entry_type = entry.header().entry_type();
    if !is_enclosed(&rel_path) || entry_type.is_symlink() || entry_type.is_hard_link() {
      bail!("The archive {:?} contains an unsafe entry {:?}", archive_path, rel_path);
    }
    entry
      .unpack_in(dest_dir)
      .with_context(|| format!("Failed to extract {:?}", rel_path))?;
    if entry_type.is_file() {
      extracted.push(dest_dir.join(&rel_path));
    }
  }
  Ok(extracted)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::layout::GeneratedTree;
  use flate2::write::GzEncoder;
  use flate2::Compression;
  use pretty_assertions::assert_eq;

  /// Writes the entries with raw names, the checks `tar::Builder` does on
  /// paths are skipped on purpose.
  pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
      let mut builder = tar::Builder::new(GzEncoder::new(&mut bytes, Compression::default()));
      for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
      }
      builder.into_inner().unwrap().finish().unwrap();
    }
    bytes
  }

  fn sample_tree(root: &Path) -> GeneratedTree {
    let mut tree = GeneratedTree::new();
    tree.insert("German/config.ini".to_owned(), b"base=1\n".to_vec()).unwrap();
    tree.insert("Ukrainian/config.ini".to_owned(), b"base=2\n".to_vec()).unwrap();
    tree.insert("Ukrainian/licenses/LICENSE".to_owned(), b"MIT".to_vec()).unwrap();
    tree.insert("langs/German.json".to_owned(), b"[]\n".to_vec()).unwrap();
    tree.write_to(root).unwrap();
    tree
  }

  #[test]
  fn test_exclude_set() {
    let excludes = ExcludeSet::new(&["licenses/", "*.bak"]).unwrap();
    assert!(excludes.is_excluded("licenses"));
    assert!(excludes.is_excluded("licenses/LICENSE"));
    assert!(!excludes.is_excluded("a/licenses"));
    assert!(!excludes.is_excluded("a/licenses/b"));
    assert!(excludes.is_excluded("x/config.bak"));
    assert!(!excludes.is_excluded("German/config.ini"));
    assert!(!ExcludeSet::default().is_excluded("licenses"));
    assert!(!ExcludeSet::new::<&str>(&[]).unwrap().is_excluded("licenses"));
    assert!(ExcludeSet::new(&["[unclosed"]).is_err());
  }

  #[test]
  fn test_archive_format_detect() {
    assert_eq!(ArchiveFormat::detect("NX_uk_FW17.zip"), Some((ArchiveFormat::Zip, "NX_uk_FW17")));
    assert_eq!(ArchiveFormat::detect("pack.TAR.GZ"), Some((ArchiveFormat::TarGz, "pack")));
    assert_eq!(ArchiveFormat::detect("pack.tgz"), Some((ArchiveFormat::TarGz, "pack")));
    assert_eq!(ArchiveFormat::detect("notes.txt"), None);
    assert_eq!(ArchiveFormat::detect(".zip"), None);
  }

  #[test]
  fn test_unpack_tar_gz() {
    let tmp = tempfile::tempdir().unwrap();
    let archive_path = tmp.path().join("pack.tar.gz");
    let bytes = tar_gz(&[("uk/replaces_ru-EU/a.txt", &b"a"[..]), ("uk/readme", &b"hi"[..])]);
    fs::write(&archive_path, bytes).unwrap();

    let out = tmp.path().join("out");
    let extracted = ArchiveFormat::TarGz.unpack(&archive_path, &out).unwrap();
    assert_eq!(extracted, [out.join("uk/replaces_ru-EU/a.txt"), out.join("uk/readme")]);
    assert_eq!(fs::read(out.join("uk/readme")).unwrap(), b"hi");
  }

  #[test]
  fn test_unpack_tar_gz_rejects_escaping_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let archive_path = tmp.path().join("evil.tar.gz");
    fs::write(&archive_path, tar_gz(&[("../escaped.txt", &b"x"[..])])).unwrap();
    let out = tmp.path().join("out");
    assert!(unpack_tar_gz(&archive_path, &out).is_err());
    assert!(!tmp.path().join("escaped.txt").exists());

    fs::write(&archive_path, b"not gzip at all").unwrap();
    assert!(unpack_tar_gz(&archive_path, &out).is_err());
  }

  #[test]
  fn test_archive_file_name_for() {
    let legacy_name = archive_file_name_for(Path::new("out/replaces_ru-EU"));
    assert_eq!(legacy_name.as_deref(), Some("ru-EU.zip"));
    assert_eq!(archive_file_name_for(Path::new("out/German")).as_deref(), Some("German.zip"));
    assert_eq!(archive_file_name_for(Path::new("replaces_")), None);
  }

  #[test]
  fn test_pack_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let tree = sample_tree(&root);
    let archive_path = tmp.path().join("dist").join("tree.zip");

    let packed = pack(&root, &archive_path, &ExcludeSet::default()).unwrap();
    assert_eq!(packed.entries, tree.paths().collect::<Vec<_>>());

    let out = tmp.path().join("extracted");
    unpack(&archive_path, &out).unwrap();
    assert_eq!(GeneratedTree::read_from(&out).unwrap(), tree);
  }

  #[test]
  fn test_pack_honors_excludes_and_overwrites() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);
    let archive_path = tmp.path().join("tree.zip");
    fs::write(&archive_path, b"definitely not a zip").unwrap();

    let excludes = ExcludeSet::new(&["*/licenses"]).unwrap();
    let packed = pack(&root, &archive_path, &excludes).unwrap();
    assert_eq!(packed.entries, ["German/config.ini", "Ukrainian/config.ini", "langs/German.json"]);

    let archive = ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, packed.entries);
  }

  #[test]
  fn test_pack_is_reproducible() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);
    let a = tmp.path().join("a.zip");
    let b = tmp.path().join("b.zip");
    pack(&root, &a, &ExcludeSet::default()).unwrap();
    pack(&root, &b, &ExcludeSet::default()).unwrap();
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
  }

  #[test]
  fn test_pack_all_continues_after_missing_source() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);
    let targets = vec![
      ArchiveTarget {
        source_dir: tmp.path().join("missing"),
        archive_path: tmp.path().join("missing.zip"),
      },
      ArchiveTarget {
        source_dir: root.join("German"),
        archive_path: tmp.path().join("German.zip"),
      },
    ];
    let (packed, errors_count) = pack_all(&targets, &ExcludeSet::default());
    assert_eq!(errors_count, 1);
    assert_eq!(packed.len(), 1);
    assert_eq!(packed[0].entries, ["config.ini"]);
    assert!(!tmp.path().join("missing.zip").exists());
  }

  #[test]
  fn test_pack_skips_archive_inside_source() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    sample_tree(&root);
    let archive_path = root.join("self.zip");
    pack(&root, &archive_path, &ExcludeSet::default()).unwrap();
    let packed = pack(&root, &archive_path, &ExcludeSet::default()).unwrap();
    assert!(!packed.entries.iter().any(|e| e == "self.zip"));
  }
}
