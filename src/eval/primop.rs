use super::{thunk::ThunkRef, value::Value, Eval};
use crate::util::*;
use std::fmt::{self, Debug};

pub type PrimopFn = fn(&Eval, Vec<ThunkRef>) -> Result<Value>;

/// A builtin function. Partial applications are kept in
/// [`Value::Primop`] until `arity` arguments have been collected.
pub struct Primop {
  pub name: &'static str,
  pub arity: usize,
  pub op: PrimopFn,
}

impl Debug for Primop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<primop {}>", &self.name)
  }
}
