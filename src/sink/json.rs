use super::JobSink;
use crate::{
  jobs::{EvalError, Job, Record},
  util::*,
};
use std::io::Write;

/// Collects records and writes them as one JSON array on `finish`.
pub struct JsonSink<W: Write> {
  out: W,
  records: Vec<Record>,
}

impl<W: Write> JsonSink<W> {
  pub fn new(out: W) -> Self {
    Self {
      out,
      records: vec![],
    }
  }
}

impl<W: Write> JobSink for JsonSink<W> {
  fn job(&mut self, job: &Job) -> Result<()> {
    self.records.push(Record::Job(job.clone()));
    Ok(())
  }

  fn error(&mut self, error: &EvalError) -> Result<()> {
    self.records.push(Record::Error(error.clone()));
    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    serde_json::to_writer_pretty(&mut self.out, &self.records)?;
    self.out.write_all(b"\n")?;
    self.out.flush()?;
    Ok(())
  }
}
