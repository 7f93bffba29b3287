use crate::sink::Format;
use std::{env, path::PathBuf};

pub mod cli;

pub use cli::{ArgSpec, ArgValue, CliOptions};

/// Run configuration. Defaults come from the environment, command line
/// options override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  /// The store directory output and `.drv` paths are computed for.
  pub store_dir: PathBuf,
  pub format: Format,
  /// Report the whole context chain of evaluation errors.
  pub show_trace: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_dir: env::var_os("NIX_STORE_DIR")
        .map_or_else(|| PathBuf::from("/nix/store"), PathBuf::from),
      format: Format::default(),
      show_trace: env::var("NIX_SHOW_TRACE").map_or(false, |v| !v.is_empty()),
    }
  }
}

impl Settings {
  pub fn from_options(options: &CliOptions) -> Self {
    let mut settings = Self::default();
    settings.apply_overrides(options);
    settings
  }
}
