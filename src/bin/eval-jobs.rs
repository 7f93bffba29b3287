#[macro_use] extern crate log;

use eval_jobs::{
  error::OrExit,
  release,
  settings::{CliOptions, Settings},
  util::*,
};

fn main() -> Result<()> {
  let (options, args) = CliOptions::parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit());
  eval_jobs::logger::init()?;

  let settings = Settings::from_options(&options);
  debug!("{:?}", settings);

  let stdout = std::io::stdout();
  release::eval_release(&settings, &args, &options.release_expr, stdout.lock()).or_exit();
  Ok(())
}
