#![deny(missing_debug_implementations)]
#![allow(clippy::new_without_default)]

#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod archive;
pub mod cli;
pub mod config;
pub mod decoding;
pub mod github;
pub mod impl_prelude;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod repackage;
pub mod staleness;
pub mod template;
pub mod utils;

pub const CRATE_TITLE: &str = "LangSync";
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
pub const CRATE_BIN_NAME: &str = "langsync";
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NICE_VERSION: &str = match option_env!("CARGO_PKG_NICE_VERSION") {
  Some(v) => v,
  None => CRATE_VERSION,
};
