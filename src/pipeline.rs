//! The whole run: fetch, decide, regenerate, archive. Everything that can fail
//! because of bad input (the manifest, the templates, the configuration) is
//! dealt with before the output directory is touched, so a failed run never
//! leaves a half-regenerated tree behind.

use crate::archive::{self, ArchiveTarget, PackedArchive};
use crate::config::SyncConfig;
use crate::github::ReleaseSource;
use crate::impl_prelude::*;
use crate::layout::{self, GeneratedTree, LayoutOptions};
use crate::manifest::LanguageManifest;
use crate::staleness::{self, Decision, Reference, ReleaseInfo};
use crate::utils;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
  /// Regenerate even if the staleness check says there's nothing to do.
  pub force: bool,
  /// Go as far as rendering the tree, but don't write anything.
  pub dry_run: bool,
}

#[derive(Debug)]
pub enum SyncOutcome {
  UpToDate,
  Skipped { reason: String },
  Generated(GenerationReport),
}

#[derive(Debug)]
pub struct GenerationReport {
  pub tree: GeneratedTree,
  pub archives: Vec<PackedArchive>,
  pub dry_run: bool,
}

/// The last-run marker takes precedence over the mirror, so that setting a
/// marker path is enough to switch away from the default mirror.
pub fn resolve_reference(
  source: &dyn ReleaseSource,
  config: &SyncConfig,
) -> AnyResult<Reference> {
  if let Some(marker_path) = &config.last_run_marker {
    return Ok(match staleness::read_last_run_marker(marker_path)? {
      Some(last_run) => {
        info!("Last successful run was at {}", last_run);
        Reference::LastRun(last_run)
      }
      None => Reference::NeverRan,
    });
  }
  if let Some(mirror) = &config.mirror {
    let commit = source.latest_commit(&mirror.owner, &mirror.repo).with_context(|| {
      format!("Failed to fetch the latest commit of {}/{}", mirror.owner, mirror.repo)
    })?;
    return Ok(match commit {
      Some(commit) => {
        info!(
          "Latest commit of the mirror {}/{} is from {}",
          mirror.owner, mirror.repo, commit.committer_date,
        );
        Reference::Commit(commit)
      }
      None => Reference::NoCommits,
    });
  }
  warn!("Neither a mirror repository nor a last-run marker is configured, assuming a first run");
  Ok(Reference::NeverRan)
}

/// Fetches both timestamps and makes the decision. Nothing is written here.
pub fn check(
  source: &dyn ReleaseSource,
  config: &SyncConfig,
) -> AnyResult<(ReleaseInfo, Decision)> {
  let upstream = &config.upstream;
  let release = source.latest_release(&upstream.owner, &upstream.repo).with_context(|| {
    format!("Failed to fetch the latest release of {}/{}", upstream.owner, upstream.repo)
  })?;
  info!(
    "Latest release of {}/{} is {:?} from {}",
    upstream.owner, upstream.repo, release.tag, release.published_at,
  );

  let reference = resolve_reference(source, config)?;
  let decision = staleness::decide(&release, &reference);
  match &decision {
    Decision::Update => info!("The release is newer than the reference, an update is needed"),
    Decision::UpToDate => info!("The reference is not older than the release, nothing to do"),
    Decision::Undecidable(reason) => warn!("Can't decide whether to update: {}", reason),
  }
  Ok((release, decision))
}

pub fn fetch_manifest(
  source: &dyn ReleaseSource,
  config: &SyncConfig,
  release: &ReleaseInfo,
) -> AnyResult<Vec<u8>> {
  let url = match &config.manifest_url {
    Some(url) => url.as_str(),
    None => match release.find_asset(&config.manifest_asset) {
      Some(asset) => asset.download_url.as_str(),
      None => bail!(
        "The release {:?} has no {:?} asset and no manifest URL was configured",
        release.tag,
        config.manifest_asset,
      ),
    },
  };
  source.download(url).with_context(|| format!("Failed to download the manifest from {}", url))
}

pub fn sync(
  source: &dyn ReleaseSource,
  config: &SyncConfig,
  opts: SyncOptions,
) -> AnyResult<SyncOutcome> {
  let (release, decision) = check(source, config)?;
  match decision {
    Decision::Update => {}
    _ if opts.force => info!("Forced to regenerate anyway"),
    Decision::UpToDate => return Ok(SyncOutcome::UpToDate),
    Decision::Undecidable(reason) => return Ok(SyncOutcome::Skipped { reason }),
  }

  let manifest_path = config.saved_manifest_path()?;
  let manifest_bytes = fetch_manifest(source, config, &release)?;
  if !opts.dry_run {
    utils::create_dir_recursively(&config.work_dir)
      .with_context(|| format!("Failed to create directory {:?}", config.work_dir))?;
    fs::write(&manifest_path, &manifest_bytes)
      .with_context(|| format!("Failed to save the manifest to {:?}", manifest_path))?;
    debug!("Saved the manifest to {:?}", manifest_path);
  }

  let report = generate(&manifest_bytes, config, opts.dry_run)?;

  if !opts.dry_run {
    if let Some(marker_path) = &config.last_run_marker {
      let timestamp = staleness::write_last_run_marker(marker_path)?;
      info!("Saved the time of this run ({}) to {:?}", timestamp, marker_path);
    }
  }
  Ok(SyncOutcome::Generated(report))
}

/// Regenerates the output tree and the archives from a manifest document.
pub fn generate(
  manifest_bytes: &[u8],
  config: &SyncConfig,
  dry_run: bool,
) -> AnyResult<GenerationReport> {
  let manifest = LanguageManifest::from_slice(manifest_bytes)?;
  info!("The manifest lists {} languages", manifest.languages.len());
  let layout_opts = config.layout_options()?;
  let excludes = config.exclude_set()?;
  let table = config.decoding_table();
  let tree = layout::generate(&manifest, &table, &layout_opts)?;
  info!("Generated {} files", tree.len());
  let targets = archive_targets(config, &manifest, &layout_opts, &tree)?;

  if dry_run {
    for path in tree.paths() {
      info!("Would write {:?}", config.output_dir.join(path));
    }
    for target in &targets {
      info!("Would pack {:?}", target.archive_path);
    }
    return Ok(GenerationReport { tree, archives: Vec::new(), dry_run });
  }

  tree.write_to(&config.output_dir)?;
  info!("Written the tree to {:?}", config.output_dir);

  let (archives, errors_count) = archive::pack_all(&targets, &excludes);
  if errors_count > 0 {
    bail!("Failed to create {} of {} archives, see logs above", errors_count, targets.len());
  }
  Ok(GenerationReport { tree, archives, dry_run })
}

/// The whole tree goes into one archive, and optionally every language
/// folder into its own. Two targets sharing an archive path are an error.
pub fn archive_targets(
  config: &SyncConfig,
  manifest: &LanguageManifest,
  layout_opts: &LayoutOptions,
  tree: &GeneratedTree,
) -> AnyResult<Vec<ArchiveTarget>> {
  let mut targets = vec![ArchiveTarget {
    source_dir: config.output_dir.clone(),
    archive_path: config.archive_dir.join(config.archive_file_name()?),
  }];
  if config.per_language_archives {
    for language in manifest.sorted_languages(layout_opts.ordering) {
      let dir_prefix = utils::fast_concat(&[&language.name, "/"]);
      if !tree.paths().any(|path| path.starts_with(&dir_prefix)) {
        warn!("There is no directory for {:?}, not archiving it separately", language.name);
        continue;
      }
      let archive_name =
        utils::fast_concat(&[&language.name, ".", archive::ARCHIVE_EXTENSION]);
      targets.push(ArchiveTarget {
        source_dir: config.output_dir.join(&language.name),
        archive_path: config.archive_dir.join(archive_name),
      });
    }
  }

  let mut seen_paths = HashSet::with_capacity(targets.len());
  for target in &targets {
    ensure!(
      seen_paths.insert(&target.archive_path),
      "Two archives would be written to {:?}, rename the language or set an archive name",
      target.archive_path,
    );
  }
  Ok(targets)
}

/// Same as [`generate`], with the manifest read from a local file.
pub fn generate_from_file(
  manifest_path: &Path,
  config: &SyncConfig,
  dry_run: bool,
) -> AnyResult<GenerationReport> {
  let bytes = fs::read(manifest_path)
    .with_context(|| format!("Failed to read the manifest {:?}", manifest_path))?;
  generate(&bytes, config, dry_run)
    .with_context(|| format!("Failed to generate the output from {:?}", manifest_path))
}
