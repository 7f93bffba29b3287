use super::Pos;
use indexmap::{map::Entry, IndexMap};
use std::{borrow::Borrow, fmt, fmt::Display, path::PathBuf, rc::Rc};

pub type ExprRef = Rc<Expr>;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display)]
#[deref(forward)]
pub struct Ident(String);

impl fmt::Debug for Ident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}", self.0)
  }
}

impl From<&str> for Ident {
  fn from(s: &str) -> Self {
    Self(s.to_owned())
  }
}

impl From<String> for Ident {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl Borrow<str> for Ident {
  fn borrow(&self) -> &str {
    &self.0
  }
}

#[derive(Debug)]
pub enum Expr {
  Int(i64),
  Str(String),
  Path(PathBuf),
  Var(Pos, Ident),
  Select {
    pos: Pos,
    lhs: ExprRef,
    path: AttrPath,
    or: Option<ExprRef>,
  },
  HasAttr {
    lhs: ExprRef,
    path: AttrPath,
  },
  Lambda(Rc<Lambda>),
  Apply {
    pos: Pos,
    lhs: ExprRef,
    rhs: ExprRef,
  },
  List(Vec<ExprRef>),
  Attrs(Attrs),
  Let {
    attrs: Attrs,
    body: ExprRef,
  },
  With {
    env: ExprRef,
    body: ExprRef,
  },
  If {
    cond: ExprRef,
    rhs1: ExprRef,
    rhs2: ExprRef,
  },
  Assert {
    pos: Pos,
    cond: ExprRef,
    body: ExprRef,
  },
  Op {
    pos: Pos,
    bin: Bin,
    lhs: ExprRef,
    rhs: ExprRef,
  },
  Not(ExprRef),
  Negate(ExprRef),
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
  #[display(fmt = "==")]
  Eq,
  #[display(fmt = "!=")]
  Neq,
  #[display(fmt = "&&")]
  And,
  #[display(fmt = "||")]
  Or,
  #[display(fmt = "->")]
  Impl,
  #[display(fmt = "//")]
  Update,
  #[display(fmt = "++")]
  ConcatLists,
  #[display(fmt = "<")]
  Lt,
  #[display(fmt = "<=")]
  Leq,
  #[display(fmt = ">")]
  Gt,
  #[display(fmt = ">=")]
  Geq,
  #[display(fmt = "+")]
  Add,
  #[display(fmt = "-")]
  Sub,
  #[display(fmt = "*")]
  Mul,
  #[display(fmt = "/")]
  Div,
}

pub type AttrPath = Vec<Ident>;

#[derive(Debug)]
pub enum LambdaArg {
  Plain(Ident),
  Formals {
    name: Option<Ident>,
    formals: Formals,
  },
}

#[derive(Debug, Default)]
pub struct Formals {
  pub formals: Vec<Formal>,
  pub ellipsis: bool,
}

impl Formals {
  pub fn has(&self, name: &str) -> bool {
    self.formals.iter().any(|f| &*f.name == name)
  }
}

#[derive(Debug)]
pub struct Formal {
  pub name: Ident,
  pub def: Option<ExprRef>,
}

#[derive(Debug)]
pub struct Lambda {
  pub pos: Pos,
  pub arg: LambdaArg,
  pub body: ExprRef,
}

#[derive(Debug, Default)]
pub struct Attrs {
  pub recursive: bool,
  pub attrs: IndexMap<Ident, AttrDef>,
}

#[derive(Debug)]
pub struct AttrDef {
  pub pos: Pos,
  pub inherited: bool,
  pub rhs: ExprRef,
}

impl Attrs {
  /// Adds `path = rhs`, creating intermediate sets for dotted paths and
  /// merging into sets that were already written out literally.
  pub fn add_attr(&mut self, pos: Pos, path: &[Ident], rhs: ExprRef) -> Result<(), String> {
    match path {
      [] => Err("empty attribute path".into()),
      [name] => match self.attrs.entry(name.clone()) {
        Entry::Vacant(v) => {
          v.insert(AttrDef {
            pos,
            inherited: false,
            rhs,
          });
          Ok(())
        }
        Entry::Occupied(mut o) => {
          let existing = o.get_mut();
          match (Rc::try_unwrap(rhs), nested_attrs(existing)) {
            (Ok(Expr::Attrs(new)), Some(target)) if !new.recursive => {
              for (k, def) in new.attrs {
                if target.attrs.contains_key(&k) {
                  return Err(format!("attribute `{}.{}' already defined", name, k));
                }
                target.attrs.insert(k, def);
              }
              Ok(())
            }
            _ => Err(format!("attribute `{}' already defined", name)),
          }
        }
      },
      [name, rest @ ..] => match self.attrs.entry(name.clone()) {
        Entry::Vacant(v) => {
          let mut nested = Attrs::default();
          nested.add_attr(pos, rest, rhs)?;
          v.insert(AttrDef {
            pos,
            inherited: false,
            rhs: Rc::new(Expr::Attrs(nested)),
          });
          Ok(())
        }
        Entry::Occupied(mut o) => match nested_attrs(o.get_mut()) {
          Some(target) => target.add_attr(pos, rest, rhs),
          None => Err(format!("attribute `{}' already defined", name)),
        },
      },
    }
  }

  pub fn inherit(&mut self, pos: Pos, name: Ident, rhs: Expr) -> Result<(), String> {
    if self.attrs.contains_key(&name) {
      return Err(format!("attribute `{}' already defined", name));
    }
    self.attrs.insert(
      name,
      AttrDef {
        pos,
        inherited: true,
        rhs: Rc::new(rhs),
      },
    );
    Ok(())
  }
}

fn nested_attrs(def: &mut AttrDef) -> Option<&mut Attrs> {
  if def.inherited {
    return None;
  }
  match Rc::get_mut(&mut def.rhs) {
    Some(Expr::Attrs(a)) if !a.recursive => Some(a),
    _ => None,
  }
}

fn show_attrpath(f: &mut fmt::Formatter, path: &[Ident]) -> fmt::Result {
  for (i, attr) in path.iter().enumerate() {
    if i > 0 {
      f.write_str(".")?;
    }
    attr.fmt(f)?;
  }
  Ok(())
}

impl Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Expr::Int(n) => n.fmt(f),
      Expr::Str(s) => write!(f, "{:?}", s),
      Expr::Path(p) => p.display().fmt(f),
      Expr::Var(_, n) => n.fmt(f),
      Expr::Select { lhs, path, or, .. } => {
        write!(f, "({}).", lhs)?;
        show_attrpath(f, path)?;
        if let Some(x) = or {
          write!(f, " or ({})", x)?;
        }
        Ok(())
      }
      Expr::HasAttr { lhs, path } => {
        write!(f, "(({}) ? ", lhs)?;
        show_attrpath(f, path)?;
        f.write_str(")")
      }
      Expr::Lambda(l) => {
        write!(f, "(")?;
        match &l.arg {
          LambdaArg::Plain(i) => write!(f, "{}", i)?,
          LambdaArg::Formals {
            name: Some(x),
            formals,
          } => write!(f, "{} @ {}", formals, x)?,
          LambdaArg::Formals {
            name: None,
            formals,
          } => write!(f, "{}", formals)?,
        }
        write!(f, ": {})", l.body)
      }
      Expr::Apply { lhs, rhs, .. } => write!(f, "({} {})", lhs, rhs),
      Expr::List(l) => {
        write!(f, "[ ")?;
        for item in l {
          write!(f, "({}) ", item)?;
        }
        f.write_str("]")
      }
      Expr::Attrs(a) => {
        if a.recursive {
          write!(f, "rec ")?;
        }
        write!(f, "{{ {}}}", a)
      }
      Expr::Let { attrs, body } => write!(f, "(let {}in {})", attrs, body),
      Expr::With { env, body } => write!(f, "(with {}; {})", env, body),
      Expr::If { cond, rhs1, rhs2 } => write!(f, "(if {} then {} else {})", cond, rhs1, rhs2),
      Expr::Assert { cond, body, .. } => write!(f, "assert {}; {}", cond, body),
      Expr::Op { bin, lhs, rhs, .. } => write!(f, "({} {} {})", lhs, bin, rhs),
      Expr::Not(e) => write!(f, "(!{})", e),
      Expr::Negate(e) => write!(f, "(-{})", e),
    }
  }
}

impl Display for Attrs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (key, val) in &self.attrs {
      if val.inherited {
        write!(f, "inherit {}; ", key)?;
      } else {
        write!(f, "{} = {}; ", key, val.rhs)?;
      }
    }
    Ok(())
  }
}

impl Display for Formals {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    write!(f, "{{ ")?;
    for item in &self.formals {
      if !first {
        write!(f, ", ")?;
      }
      first = false;
      write!(f, "{}", item.name)?;
      if let Some(e) = &item.def {
        write!(f, " ? {}", e)?;
      }
    }
    if self.ellipsis {
      if first {
        write!(f, "...")?
      } else {
        write!(f, ", ...")?
      }
    }
    if first {
      write!(f, "}}")
    } else {
      write!(f, " }}")
    }
  }
}
