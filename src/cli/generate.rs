use crate::impl_prelude::*;
use crate::pipeline;

use std::path::PathBuf;

#[derive(Debug)]
pub struct GenerateCommand;

impl super::Command for GenerateCommand {
  fn name(&self) -> &'static str { "generate" }

  fn create_arg_parser<'help>(&self, app: clap::Command<'help>) -> clap::Command<'help> {
    let app = app
      .about("Generates the configs and the archives from a manifest on disk, without any network.")
      .arg(
        clap::Arg::new("manifest")
          .value_name("MANIFEST")
          .value_hint(clap::ValueHint::FilePath)
          .required(true)
          .value_parser(clap::value_parser!(PathBuf))
          .help("Path to the languages manifest."),
      );
    super::add_output_args(app)
  }

  fn run(&self, global_opts: super::GlobalOpts, matches: &clap::ArgMatches) -> AnyResult<()> {
    let mut config = global_opts.load_config()?;
    super::apply_output_args(&mut config, matches);
    let manifest_path =
      matches.get_one::<PathBuf>("manifest").ok_or_else(|| format_err!("No manifest given"))?;
    let dry_run = super::is_flag_set(matches, "dry_run");

    let report = pipeline::generate_from_file(manifest_path, &config, dry_run)?;
    if dry_run {
      info!("Dry run finished, {} files would have been generated", report.tree.len());
    } else {
      info!("Generated {} files and {} archives", report.tree.len(), report.archives.len());
    }
    Ok(())
  }
}
