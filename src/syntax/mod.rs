use self::expr::ExprRef;
use crate::util::*;
use codespan_reporting::files::{Files as _, SimpleFiles};
use parking_lot::Mutex;
use std::{
  fmt,
  path::Path,
  sync::atomic::{AtomicUsize, Ordering},
};

pub mod expr;
pub mod lexer;
pub mod parse;

pub use parse::ParseError;

static INLINE_COUNTER: AtomicUsize = AtomicUsize::new(0);

lazy_static! {
  pub static ref FILES: Mutex<SimpleFiles<String, String>> = Mutex::new(SimpleFiles::new());
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pos {
  pub file: usize,
  pub start: usize,
  pub end: usize,
}

impl fmt::Display for Pos {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let files = FILES.lock();
    match (files.name(self.file), files.location(self.file, self.start)) {
      (Ok(name), Ok(loc)) => write!(f, "{}:{}:{}", name, loc.line_number, loc.column_number),
      _ => write!(f, "<unknown>:{}", self.start),
    }
  }
}

fn parse_str(file: usize, base_path: &Path, input: &str) -> Result<ExprRef> {
  let tokens = lexer::Lexer::new(input, file).tokenize()?;
  Ok(parse::Parser::new(file, base_path, tokens, input.len()).parse()?)
}

pub fn parse_inline(input: &str, base_path: &Path) -> Result<ExprRef> {
  let filename = format!(
    "<inline-{}>",
    INLINE_COUNTER.fetch_add(1, Ordering::Relaxed)
  );
  let mut files = FILES.lock();
  let id = files.add(filename, input.to_owned());
  parse_str(id, base_path, files.get(id)?.source())
}

pub fn parse_from_file<P: AsRef<Path>>(path: P) -> Result<ExprRef> {
  let path = path.as_ref();
  trace!("loading file: {}", path.display());
  let contents = std::fs::read_to_string(path)
    .with_context(|| format!("cannot read `{}'", path.display()))?;
  let base = path.parent().unwrap_or_else(|| Path::new("/"));
  let mut files = FILES.lock();
  let id = files.add(path.display().to_string(), contents);
  parse_str(id, base, files.get(id)?.source())
}
