pub mod check;
pub mod completions;
pub mod generate;
pub mod repackage;
pub mod sync;

use crate::config::{self, RepoRef, SyncConfig};
use crate::impl_prelude::*;

use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GlobalOpts {
  pub verbose: bool,
  pub config_path: Option<PathBuf>,
}

impl GlobalOpts {
  pub fn from_matches(matches: &clap::ArgMatches) -> Self {
    Self {
      verbose: matches.get_one::<bool>("verbose").copied().unwrap_or(false),
      config_path: matches.get_one::<PathBuf>("config").cloned(),
    }
  }

  pub fn load_config(&self) -> AnyResult<SyncConfig> {
    match &self.config_path {
      Some(path) => {
        info!("Loading the configuration from {:?}", path);
        SyncConfig::load(path)
      }
      None => Ok(SyncConfig::default()),
    }
  }
}

assert_trait_is_object_safe!(Command);
pub trait Command {
  fn name(&self) -> &'static str;

  fn create_arg_parser<'help>(&self, app: clap::Command<'help>) -> clap::Command<'help>;

  fn run(&self, global_opts: GlobalOpts, matches: &clap::ArgMatches) -> AnyResult<()>;
}

pub fn all_commands() -> [&'static dyn Command; 5] {
  [
    &sync::SyncCommand,
    &check::CheckCommand,
    &generate::GenerateCommand,
    &repackage::RepackageCommand,
    &completions::CompletionsCommand,
  ]
}

pub fn create_complete_arg_parser(
) -> (clap::Command<'static>, HashMap<&'static str, &'static dyn Command>) {
  let mut arg_parser = create_arg_parser();
  let mut commands_map = HashMap::new();
  for command in all_commands() {
    let name = command.name();
    arg_parser = arg_parser.subcommand(command.create_arg_parser(clap::Command::new(name)));
    commands_map.insert(name, command);
  }
  (arg_parser, commands_map)
}

fn create_arg_parser() -> clap::Command<'static> {
  clap::Command::new(crate::CRATE_TITLE)
    .version(crate::CRATE_NICE_VERSION)
    .about(
      "Keeps packaged translation configs in sync with the releases of an upstream translation \
      project.",
    )
    .subcommand_required(true)
    .arg_required_else_help(true)
    .arg(
      clap::Arg::new("verbose")
        .short('v')
        .long("verbose")
        .global(true)
        .action(clap::ArgAction::SetTrue)
        .help("Print more logs, may help with troubleshooting."),
    )
    .arg(
      clap::Arg::new("config")
        .value_name("PATH")
        .value_hint(clap::ValueHint::FilePath)
        .short('c')
        .long("config")
        .global(true)
        .takes_value(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the JSON file describing the sync job."),
    )
}

/// Options shared by the commands which render the output tree.
pub fn add_output_args<'help>(app: clap::Command<'help>) -> clap::Command<'help> {
  app
    .arg(
      clap::Arg::new("template")
        .value_name("PATH")
        .value_hint(clap::ValueHint::FilePath)
        .short('t')
        .long("template")
        .takes_value(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("The config file template."),
    )
    .arg(
      clap::Arg::new("output_dir")
        .value_name("DIR")
        .value_hint(clap::ValueHint::DirPath)
        .short('o')
        .long("output-dir")
        .takes_value(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Where to generate the tree. Its previous contents are deleted!"),
    )
    .arg(
      clap::Arg::new("archive_dir")
        .value_name("DIR")
        .value_hint(clap::ValueHint::DirPath)
        .long("archive-dir")
        .takes_value(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Where to put the zip archives."),
    )
    .arg(
      clap::Arg::new("langs")
        .long("langs")
        .action(clap::ArgAction::SetTrue)
        .help("Also generate the per-language JSON descriptors."),
    )
    .arg(
      clap::Arg::new("with_header")
        .long("with-header")
        .action(clap::ArgAction::SetTrue)
        .help("Start the config files with a comment telling to keep only one section active."),
    )
    .arg(
      clap::Arg::new("dry_run")
        .short('n')
        .long("dry-run")
        .action(clap::ArgAction::SetTrue)
        .help("Render everything, but don't write anything to the disk."),
    )
}

pub fn apply_output_args(config: &mut SyncConfig, matches: &clap::ArgMatches) {
  if let Some(path) = matches.get_one::<PathBuf>("template") {
    config.config_template = Some(path.clone());
  }
  if let Some(path) = matches.get_one::<PathBuf>("output_dir") {
    config.output_dir = path.clone();
  }
  if let Some(path) = matches.get_one::<PathBuf>("archive_dir") {
    config.archive_dir = path.clone();
  }
  if is_flag_set(matches, "langs") {
    config.langs = true;
  }
  if is_flag_set(matches, "with_header") {
    config.header_comment.get_or_insert_with(|| config::DEFAULT_HEADER_COMMENT.to_owned());
  }
}

/// Options shared by the commands which talk to the hosting service.
pub fn add_remote_args<'help>(app: clap::Command<'help>) -> clap::Command<'help> {
  app
    .arg(
      clap::Arg::new("upstream")
        .value_name("OWNER/REPO")
        .value_hint(clap::ValueHint::Other)
        .long("upstream")
        .takes_value(true)
        .help("The repository whose releases are tracked."),
    )
    .arg(
      clap::Arg::new("mirror")
        .value_name("OWNER/REPO")
        .value_hint(clap::ValueHint::Other)
        .long("mirror")
        .takes_value(true)
        .help("The repository whose latest commit is compared against the release."),
    )
    .arg(
      clap::Arg::new("last_run_marker")
        .value_name("PATH")
        .value_hint(clap::ValueHint::FilePath)
        .long("last-run-marker")
        .takes_value(true)
        .conflicts_with("mirror")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Compare the release against the time of the last run instead of a mirror."),
    )
}

pub fn apply_remote_args(config: &mut SyncConfig, matches: &clap::ArgMatches) -> AnyResult<()> {
  if let Some(upstream) = matches.get_one::<String>("upstream") {
    config.upstream = RepoRef::parse(upstream).context("Invalid upstream repository")?;
  }
  if let Some(mirror) = matches.get_one::<String>("mirror") {
    config.mirror = Some(RepoRef::parse(mirror).context("Invalid mirror repository")?);
    // Otherwise a marker from the config file would shadow it.
    config.last_run_marker = None;
  }
  if let Some(path) = matches.get_one::<PathBuf>("last_run_marker") {
    config.mirror = None;
    config.last_run_marker = Some(path.clone());
  }
  Ok(())
}

pub fn is_flag_set(matches: &clap::ArgMatches, id: &str) -> bool {
  matches.get_one::<bool>(id).copied().unwrap_or(false)
}

pub fn main() -> i32 {
  let (arg_parser, commands_map) = create_complete_arg_parser();
  let matches = arg_parser.get_matches();
  let global_opts = GlobalOpts::from_matches(&matches);

  crate::logging::init(global_opts.verbose);
  crate::logging::print_banner_message();

  let result = match matches.subcommand() {
    Some((name, command_matches)) => match commands_map.get(name) {
      Some(command) => command.run(global_opts, command_matches),
      None => Err(format_err!("Unknown command {:?}", name)),
    },
    None => Err(format_err!("No command was given")),
  };

  match result {
    Ok(()) => 0,
    Err(e) => {
      report_critical_error!(e);
      1
    }
  }
}
