use crate::{
  jobs::{EvalError, Job, Record},
  util::*,
};
use std::{io::Write, str::FromStr};

mod json;
mod xml;

pub use json::JsonSink;
pub use xml::XmlSink;

/// Receives records in the order the walker discovers them.
pub trait JobSink {
  fn job(&mut self, job: &Job) -> Result<()>;

  fn error(&mut self, error: &EvalError) -> Result<()>;

  /// Completes the document. Nothing may be written afterwards.
  fn finish(&mut self) -> Result<()>;
}

impl JobSink for Vec<Record> {
  fn job(&mut self, job: &Job) -> Result<()> {
    self.push(Record::Job(job.clone()));
    Ok(())
  }

  fn error(&mut self, error: &EvalError) -> Result<()> {
    self.push(Record::Error(error.clone()));
    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
  Xml,
  Json,
}

impl Default for Format {
  fn default() -> Self {
    Format::Xml
  }
}

impl FromStr for Format {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "xml" => Ok(Format::Xml),
      "json" => Ok(Format::Json),
      x => bail!("unknown output format `{}'", x),
    }
  }
}

impl Format {
  pub fn sink<'a, W: Write + 'a>(self, out: W) -> Result<Box<dyn JobSink + 'a>> {
    Ok(match self {
      Format::Xml => Box::new(XmlSink::new(out)?),
      Format::Json => Box::new(JsonSink::new(out)),
    })
  }
}
