use super::JobSink;
use crate::{
  jobs::{EvalError, Job},
  util::*,
};
use quick_xml::{
  events::{BytesDecl, BytesEnd, BytesStart, Event},
  Writer,
};
use std::{collections::BTreeMap, io::Write};

/// Streams records as a `<jobs>` document. The root element is opened
/// immediately and closed by `finish`.
pub struct XmlSink<W: Write> {
  writer: Writer<W>,
}

impl<W: Write> XmlSink<W> {
  pub fn new(out: W) -> Result<Self> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("jobs")))?;
    Ok(Self { writer })
  }

  fn args_used(&mut self, args: &BTreeMap<String, String>) -> Result<()> {
    for (name, value) in args {
      let mut arg = BytesStart::new("arg");
      arg.push_attribute(("name", name.as_str()));
      arg.push_attribute(("value", value.as_str()));
      self.writer.write_event(Event::Empty(arg))?;
    }
    Ok(())
  }

  fn element(&mut self, elem: BytesStart, args: &BTreeMap<String, String>) -> Result<()> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    if args.is_empty() {
      self.writer.write_event(Event::Empty(elem))?;
    } else {
      self.writer.write_event(Event::Start(elem))?;
      self.args_used(args)?;
      self.writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
  }
}

impl<W: Write> JobSink for XmlSink<W> {
  fn job(&mut self, job: &Job) -> Result<()> {
    let mut elem = BytesStart::new("job");
    for (k, v) in &[
      ("name", &job.name),
      ("system", &job.system),
      ("drvPath", &job.drv_path),
      ("outPath", &job.out_path),
      ("description", &job.description),
      ("longDescription", &job.long_description),
      ("license", &job.license),
      ("homepage", &job.homepage),
    ] {
      elem.push_attribute((*k, v.as_str()));
    }
    self.element(elem, &job.args_used)
  }

  fn error(&mut self, error: &EvalError) -> Result<()> {
    let mut elem = BytesStart::new("error");
    elem.push_attribute(("location", error.location.as_str()));
    elem.push_attribute(("msg", error.msg.as_str()));
    self.element(elem, &error.args_used)
  }

  fn finish(&mut self) -> Result<()> {
    self.writer.write_event(Event::End(BytesEnd::new("jobs")))?;
    let out = self.writer.get_mut();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
  }
}
