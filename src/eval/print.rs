use super::{thunk::Thunk, value::Value, Eval};
use std::fmt::Write;

const MAX_DEPTH: usize = 3;

impl Eval {
  /// Renders a value the way the Nix REPL would, forcing at most
  /// `MAX_DEPTH` levels deep. Errors raised while forcing are shown inline.
  pub fn show(&self, t: &Thunk) -> String {
    let mut out = String::new();
    self.print_thunk(t, 0, &mut out);
    out
  }

  fn print_thunk(&self, t: &Thunk, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
      out.push_str("...");
      return;
    }
    match self.value_of(t) {
      Ok(v) => self.print_value(v, depth, out),
      Err(e) => {
        let _ = write!(out, "«error: {}»", e.root_cause());
      }
    }
  }

  fn print_value(&self, v: &Value, depth: usize, out: &mut String) {
    match v {
      Value::Null => out.push_str("null"),
      Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
      Value::Int(i) => {
        let _ = write!(out, "{}", i);
      }
      Value::String(s) => print_string(s, out),
      Value::Path(p) => {
        let _ = write!(out, "{}", p.display());
      }
      Value::List(items) => {
        out.push('[');
        for item in items.iter() {
          out.push(' ');
          self.print_thunk(item, depth + 1, out);
        }
        out.push_str(" ]");
      }
      Value::AttrSet(attrs) => {
        out.push('{');
        let mut names: Vec<_> = attrs.keys().collect();
        names.sort();
        for name in names {
          let _ = write!(out, " {} = ", name);
          self.print_thunk(&attrs[name], depth + 1, out);
          out.push(';');
        }
        out.push_str(" }");
      }
      Value::Lambda { .. } => out.push_str("<LAMBDA>"),
      Value::Primop(_, args) if args.is_empty() => out.push_str("<PRIMOP>"),
      Value::Primop(..) => out.push_str("<PRIMOP-APP>"),
    }
  }
}

fn print_string(s: &str, out: &mut String) {
  out.push('"');
  for c in s.chars() {
    match c {
      '"' | '\\' => {
        out.push('\\');
        out.push(c);
      }
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('"');
}
