use super::{context::Context, value::Value};
use crate::syntax::expr::ExprRef;
use std::{
  cell::{OnceCell, RefCell},
  fmt::{self, Debug},
  mem,
  rc::Rc,
};

pub type ThunkRef = Rc<Thunk>;

#[derive(Clone, Debug)]
pub enum ThunkCell {
  Expr(ExprRef, Context),
  Apply(ThunkRef, ThunkRef),
  Blackhole,
}

pub struct Thunk {
  cell: RefCell<ThunkCell>,
  value: OnceCell<Value>,
}

// Printing only the state keeps `Debug` finite for self-referential `rec` sets.
impl Debug for Thunk {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.value_ref() {
      Some(v) => write!(f, "V({})", v.typename()),
      None => match &*self.cell.borrow() {
        ThunkCell::Expr(e, _) => write!(f, "T({})", e),
        ThunkCell::Apply(..) => f.write_str("T(<apply>)"),
        ThunkCell::Blackhole => f.write_str("T(<blackhole>)"),
      },
    }
  }
}

impl Thunk {
  pub fn new(t: ThunkCell) -> ThunkRef {
    Rc::new(Self {
      cell: RefCell::new(t),
      value: OnceCell::new(),
    })
  }

  pub fn thunk(e: ExprRef, c: Context) -> ThunkRef {
    Self::new(ThunkCell::Expr(e, c))
  }

  pub fn complete(v: Value) -> ThunkRef {
    let t = Self::new(ThunkCell::Blackhole);
    t.put_value(v);
    t
  }

  pub fn value_ref(&self) -> Option<&Value> {
    self.value.get()
  }

  /// Takes the pending computation out of the cell, leaving a blackhole behind
  /// so that re-entering this thunk is detected.
  pub fn take_thunk(&self) -> ThunkCell {
    mem::replace(&mut *self.cell.borrow_mut(), ThunkCell::Blackhole)
  }

  /// Puts back a computation whose evaluation failed, so that a later force
  /// reports the same error instead of a spurious infinite recursion.
  pub fn restore(&self, t: ThunkCell) {
    *self.cell.borrow_mut() = t;
  }

  pub fn put_value(&self, v: Value) -> &Value {
    *self.cell.borrow_mut() = ThunkCell::Blackhole;
    self.value.get_or_init(move || v)
  }
}
