use super::*;
use std::fmt::{Display, Write};

macro_rules! unquoted {
  ($x:expr, $y:expr) => {
    unquoted!($x, "{}", $y)
  };

  ($x:expr, $y:literal, $($t:tt)+) => {
    // writing into a String cannot fail
    { let _ = write!($x, concat!("\"", $y, "\""), $($t)+); }
  }
}

impl Derivation {
  /// Serializes to the ATerm `Derive(...)` form. With `mask_outputs`, output
  /// paths and the matching environment variables are blanked, which is the
  /// form output paths are hashed from.
  pub fn unparse(&self, mask_outputs: bool) -> String {
    let mut s = String::with_capacity(1024);
    s.push_str("Derive([");

    for (i, (out_name, out_path)) in self.outputs.iter().enumerate() {
      if i > 0 {
        s.push(',');
      }
      s.push('(');
      unquoted!(s, out_name);
      s.push(',');
      if mask_outputs {
        unquoted!(s, "");
      } else {
        unquoted!(s, out_path);
      }
      s.push(',');
      unquoted!(s, "");
      s.push(',');
      unquoted!(s, "");
      s.push(')');
    }

    // no input derivations or sources: string contexts are not tracked
    s.push_str("],[],");
    print_unquoted_strings(&mut s, std::iter::empty::<&str>());

    s.push(',');
    unquoted!(s, &self.platform);
    s.push(',');
    print_string(&mut s, &self.builder);
    s.push(',');
    print_strings(&mut s, self.args.iter().map(|x| x.as_str()));

    s.push_str(",[");

    for (i, (k, v)) in self.env.iter().enumerate() {
      if i > 0 {
        s.push(',');
      }
      s.push('(');
      print_string(&mut s, k);
      s.push(',');
      if mask_outputs && self.outputs.contains_key(k) {
        print_string(&mut s, "");
      } else {
        print_string(&mut s, v);
      }
      s.push(')');
    }

    s.push_str("])");

    s
  }
}

fn print_unquoted_strings<I: IntoIterator<Item = D>, D: Display>(s: &mut String, items: I) {
  s.push('[');
  for (i, item) in items.into_iter().enumerate() {
    if i > 0 {
      s.push(',');
    }
    unquoted!(s, item);
  }
  s.push(']');
}

fn print_string(s: &mut String, input: &str) {
  s.push('"');
  for c in input.chars() {
    match c {
      '"' | '\\' => {
        s.push('\\');
        s.push(c);
      }
      '\n' => s.push_str("\\n"),
      '\r' => s.push_str("\\r"),
      '\t' => s.push_str("\\t"),
      x => s.push(x),
    }
  }
  s.push('"');
}

fn print_strings<'a, I: IntoIterator<Item = &'a str>>(s: &mut String, strs: I) {
  s.push('[');
  for (i, item) in strs.into_iter().enumerate() {
    if i > 0 {
      s.push(',');
    }
    print_string(s, item);
  }
  s.push(']');
}
