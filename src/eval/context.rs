use super::thunk::ThunkRef;
use crate::syntax::expr::Ident;
use im::Vector;
use indexmap::IndexMap;
use std::rc::Rc;

/// Attribute sets and lexical scopes share one representation so that `rec`
/// sets and `let` blocks can be pushed onto a context as-is.
pub type StaticScope = IndexMap<Ident, ThunkRef>;

#[derive(Clone, Debug, Default)]
pub struct Context {
  pub scopes: Vector<Rc<Scope>>,
  pub with: Vector<ThunkRef>,
}

impl Context {
  pub fn new() -> Self {
    Self {
      scopes: Vector::new(),
      with: Vector::new(),
    }
  }

  pub fn prepend(&self, s: Scope) -> Self {
    let mut scope = self.scopes.clone();
    scope.push_front(Rc::new(s));
    Self {
      scopes: scope,
      with: self.with.clone(),
    }
  }

  pub fn add_with(&self, s: ThunkRef) -> Self {
    let mut w = self.with.clone();
    w.push_front(s);
    Self {
      scopes: self.scopes.clone(),
      with: w,
    }
  }
}

#[derive(Debug)]
pub enum Scope {
  Dynamic(ThunkRef),
  Static(StaticScope),
}
