use super::{
  context::{Context, StaticScope},
  primop::Primop,
  thunk::ThunkRef,
};
use crate::syntax::expr::Lambda;
use std::{path::PathBuf, rc::Rc};

#[derive(Debug, Clone)]
pub enum Value {
  Null,
  Bool(bool),
  Int(i64),
  String(String),
  Path(PathBuf),
  AttrSet(Rc<StaticScope>),
  List(Rc<Vec<ThunkRef>>),
  Lambda {
    lambda: Rc<Lambda>,
    captures: Context,
  },
  Primop(Rc<Primop>, Vec<ThunkRef>),
}

impl Value {
  pub fn typename(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool { .. } => "a Boolean",
      Value::Int { .. } => "an integer",
      Value::String { .. } => "a string",
      Value::Path { .. } => "a path",
      Value::AttrSet { .. } => "a set",
      Value::List { .. } => "a list",
      Value::Lambda { .. } => "a function",
      Value::Primop(_, args) => {
        if args.is_empty() {
          "a built-in function"
        } else {
          "a partially applied built-in function"
        }
      }
    }
  }

  pub fn string<S: Into<String>>(s: S) -> Self {
    Value::String(s.into())
  }

  pub fn is_function(&self) -> bool {
    matches!(self, Value::Lambda { .. } | Value::Primop(..))
  }
}
