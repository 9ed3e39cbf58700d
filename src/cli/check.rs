use crate::github::GitHubClient;
use crate::impl_prelude::*;
use crate::pipeline;
use crate::staleness::Decision;

#[derive(Debug)]
pub struct CheckCommand;

impl super::Command for CheckCommand {
  fn name(&self) -> &'static str { "check" }

  fn create_arg_parser<'help>(&self, app: clap::Command<'help>) -> clap::Command<'help> {
    super::add_remote_args(
      app.about("Only tells whether the upstream has a release newer than the reference point."),
    )
  }

  fn run(&self, global_opts: super::GlobalOpts, matches: &clap::ArgMatches) -> AnyResult<()> {
    let mut config = global_opts.load_config()?;
    super::apply_remote_args(&mut config, matches)?;

    let client = GitHubClient::new(&config.api_base_url);
    let (release, decision) = pipeline::check(&client, &config)?;
    match decision {
      Decision::Update => info!("Release {:?} has to be synced", release.tag),
      Decision::UpToDate => info!("Release {:?} is already synced", release.tag),
      Decision::Undecidable(reason) => {
        info!("Release {:?} can't be checked: {}", release.tag, reason)
      }
    }
    Ok(())
  }
}
