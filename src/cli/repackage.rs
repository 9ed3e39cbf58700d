use crate::github::GitHubClient;
use crate::impl_prelude::*;
use crate::repackage::{self, RepackageOptions};

use std::path::PathBuf;

#[derive(Debug)]
pub struct RepackageCommand;

impl super::Command for RepackageCommand {
  fn name(&self) -> &'static str { "repackage" }

  fn create_arg_parser<'help>(&self, app: clap::Command<'help>) -> clap::Command<'help> {
    let app = app
      .about(
        "Downloads the language packs attached to the latest release and turns their replaces_* \
        folders into zip archives.",
      )
      .arg(
        clap::Arg::new("target_dir")
          .value_name("DIR")
          .value_hint(clap::ValueHint::DirPath)
          .required(true)
          .value_parser(clap::value_parser!(PathBuf))
          .help("Where to extract the packs. Its previous contents are deleted!"),
      )
      .arg(
        clap::Arg::new("filter")
          .value_name("KEYWORD")
          .value_hint(clap::ValueHint::Other)
          .long("filter")
          .takes_value(true)
          .help("Only use the assets with this in their name, e.g. `ukrainian`."),
      )
      .arg(
        clap::Arg::new("folders")
          .value_name("FOLDER")
          .value_hint(clap::ValueHint::Other)
          .long("folders")
          .takes_value(true)
          .action(clap::ArgAction::Append)
          .help("Folders to archive, e.g. `replaces_ru-EU`. By default all replaces_* folders."),
      )
      .arg(
        clap::Arg::new("no_capitalize")
          .long("no-capitalize")
          .action(clap::ArgAction::SetTrue)
          .help("Don't capitalize the language folder names."),
      );
    super::add_remote_args(app)
  }

  fn run(&self, global_opts: super::GlobalOpts, matches: &clap::ArgMatches) -> AnyResult<()> {
    let mut config = global_opts.load_config()?;
    super::apply_remote_args(&mut config, matches)?;
    let target_dir =
      matches.get_one::<PathBuf>("target_dir").ok_or_else(|| format_err!("No target given"))?;

    let opts = RepackageOptions {
      target_dir: target_dir.clone(),
      asset_filter: matches.get_one::<String>("filter").cloned(),
      folders: matches.get_many::<String>("folders").into_iter().flatten().cloned().collect(),
      capitalize: !super::is_flag_set(matches, "no_capitalize"),
      excludes: config.exclude_set()?,
    };

    let client = GitHubClient::new(&config.api_base_url);
    let report = repackage::repackage(&client, &config.upstream, &opts)?;
    if !report.missing_folders.is_empty() {
      warn!("Some of the requested folders weren't found: {:?}", report.missing_folders);
    }
    info!(
      "Repackaged {} assets of {:?} into {} archives",
      report.assets.len(),
      report.release_tag,
      report.archives.len(),
    );
    Ok(())
  }
}
