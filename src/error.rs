use crate::syntax::{ParseError, FILES};
use anyhow::Result;
use codespan_reporting::term;
use termcolor::{ColorChoice, StandardStream};

/// Terminates the process on errors that leave nothing to report on stdout.
pub trait OrExit<T> {
  fn or_exit(self) -> T;
}

impl<T> OrExit<T> for Result<T> {
  fn or_exit(self) -> T {
    match self {
      Ok(v) => v,
      Err(e) => {
        match e.downcast_ref::<ParseError>() {
          Some(parse_error) => {
            let emitted = term::emit(
              &mut StandardStream::stderr(ColorChoice::Auto),
              &Default::default(),
              &*FILES.lock(),
              &parse_error.diagnose(),
            );
            if emitted.is_err() {
              eprintln!("error: {}", parse_error);
            }
          }
          None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1)
      }
    }
  }
}
