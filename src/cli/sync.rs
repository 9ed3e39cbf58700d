use crate::github::GitHubClient;
use crate::impl_prelude::*;
use crate::pipeline::{self, SyncOptions, SyncOutcome};

#[derive(Debug)]
pub struct SyncCommand;

impl super::Command for SyncCommand {
  fn name(&self) -> &'static str { "sync" }

  fn create_arg_parser<'help>(&self, app: clap::Command<'help>) -> clap::Command<'help> {
    let app = app
      .about(
        "Checks for a new upstream release and, if there is one, regenerates the configs and \
        the archives from its manifest.",
      )
      .arg(
        clap::Arg::new("force")
          .short('f')
          .long("force")
          .action(clap::ArgAction::SetTrue)
          .help("Regenerate even if the output seems to be up to date."),
      )
      .arg(
        clap::Arg::new("manifest_url")
          .value_name("URL")
          .value_hint(clap::ValueHint::Url)
          .long("manifest-url")
          .takes_value(true)
          .help("Download the manifest from here instead of the release assets."),
      );
    super::add_output_args(super::add_remote_args(app))
  }

  fn run(&self, global_opts: super::GlobalOpts, matches: &clap::ArgMatches) -> AnyResult<()> {
    let mut config = global_opts.load_config()?;
    super::apply_remote_args(&mut config, matches)?;
    super::apply_output_args(&mut config, matches);
    if let Some(url) = matches.get_one::<String>("manifest_url") {
      config.manifest_url = Some(url.clone());
    }
    let opts = SyncOptions {
      force: super::is_flag_set(matches, "force"),
      dry_run: super::is_flag_set(matches, "dry_run"),
    };

    let client = GitHubClient::new(&config.api_base_url);
    match pipeline::sync(&client, &config, opts)? {
      SyncOutcome::UpToDate => info!("Everything is up to date"),
      SyncOutcome::Skipped { reason } => warn!("Skipped the update: {}", reason),
      SyncOutcome::Generated(report) if report.dry_run => {
        info!("Dry run finished, {} files would have been generated", report.tree.len());
      }
      SyncOutcome::Generated(report) => {
        info!("Generated {} files and {} archives", report.tree.len(), report.archives.len());
      }
    }
    Ok(())
  }
}
