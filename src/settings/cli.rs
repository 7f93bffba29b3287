use super::*;
use itertools::Itertools;
use std::ffi::OsString;
use structopt::{clap::ArgMatches, StructOpt};

#[derive(StructOpt, Debug)]
#[structopt(
  name = "eval-jobs",
  about = "Evaluate a release expression and list the build jobs it contains"
)]
pub struct CliOptions {
  #[structopt(
    long = "arg",
    number_of_values = 2,
    value_names = &["NAME", "EXPR"],
    help = "Candidate value for function argument NAME, given as an expression. May be repeated."
  )]
  pub arg: Vec<String>,

  #[structopt(
    long = "argstr",
    number_of_values = 2,
    value_names = &["NAME", "STRING"],
    help = "Candidate string value for function argument NAME. May be repeated."
  )]
  pub argstr: Vec<String>,

  #[structopt(
    long = "format",
    possible_values = &["xml", "json"],
    help = "Output document format. Defaults to xml."
  )]
  pub format: Option<Format>,

  #[structopt(long = "show-trace", help = "Report the full context of evaluation errors.")]
  pub show_trace: bool,

  #[structopt(
    long = "store",
    value_name = "DIR",
    parse(from_os_str),
    help = "Store directory to compute paths for. Defaults to $NIX_STORE_DIR or /nix/store."
  )]
  pub store: Option<PathBuf>,

  #[structopt(name = "RELEASE-EXPR", parse(from_os_str))]
  pub release_expr: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
  /// Parsed and evaluated as an expression.
  Expr(String),
  Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
  pub name: String,
  pub value: ArgValue,
}

impl CliOptions {
  /// Parses the command line, also returning `--arg` and `--argstr` values
  /// interleaved in the order they were given.
  pub fn parse_from<I, T>(args: I) -> structopt::clap::Result<(Self, Vec<ArgSpec>)>
  where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
  {
    let matches = Self::clap().get_matches_from_safe(args)?;
    let options = Self::from_clap(&matches);

    let mut specs = vec![];
    collect_args(&matches, "arg", ArgValue::Expr, &mut specs);
    collect_args(&matches, "argstr", ArgValue::Str, &mut specs);
    specs.sort_by_key(|(index, _)| *index);

    Ok((options, specs.into_iter().map(|(_, s)| s).collect()))
  }
}

fn collect_args(
  matches: &ArgMatches,
  flag: &str,
  make: fn(String) -> ArgValue,
  out: &mut Vec<(usize, ArgSpec)>,
) {
  if let (Some(indices), Some(values)) = (matches.indices_of(flag), matches.values_of(flag)) {
    for ((index, name), (_, value)) in indices.zip(values).tuples() {
      out.push((
        index,
        ArgSpec {
          name: name.to_owned(),
          value: make(value.to_owned()),
        },
      ));
    }
  }
}

impl Settings {
  pub fn apply_overrides(&mut self, options: &CliOptions) {
    if let Some(store) = &options.store {
      self.store_dir = store.clone();
    }
    if let Some(format) = options.format {
      self.format = format;
    }
    self.show_trace |= options.show_trace;
  }
}
