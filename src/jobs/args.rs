use crate::syntax::expr::Ident;
use im::{OrdMap, Vector};

/// Caller-supplied arguments along one branch of the walk.
///
/// `left` holds the candidates for names no function has consumed yet, `used`
/// the single value each consumed name was bound to. A name is in exactly one
/// of the two. Both maps are persistent, so forking a set per branch is cheap
/// and never disturbs siblings.
#[derive(Debug, Clone)]
pub struct ArgumentSet<E: Clone> {
  used: OrdMap<Ident, E>,
  left: OrdMap<Ident, Vector<E>>,
}

impl<E: Clone> Default for ArgumentSet<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Clone> ArgumentSet<E> {
  pub fn new() -> Self {
    Self {
      used: OrdMap::new(),
      left: OrdMap::new(),
    }
  }

  /// Appends `value` to the candidates for `name`. Earlier candidates are
  /// tried first.
  pub fn push_candidate(&mut self, name: Ident, value: E) {
    let mut values = self.left.get(&name).cloned().unwrap_or_default();
    values.push_back(value);
    self.left.insert(name, values);
  }

  pub fn fork(&self) -> Self {
    self.clone()
  }

  pub fn candidates(&self, name: &Ident) -> Option<&Vector<E>> {
    self.left.get(name)
  }

  pub fn set_used(&self, name: Ident, value: E) -> Self {
    Self {
      used: self.used.update(name, value),
      left: self.left.clone(),
    }
  }

  pub fn remove_left(&self, name: &Ident) -> Self {
    Self {
      used: self.used.clone(),
      left: self.left.without(name),
    }
  }

  /// Moves `name` from the candidates to the used arguments, bound to `value`.
  pub fn bind(&self, name: &Ident, value: E) -> Self {
    self.remove_left(name).set_used(name.clone(), value)
  }

  pub fn used(&self) -> &OrdMap<Ident, E> {
    &self.used
  }

  pub fn left(&self) -> &OrdMap<Ident, Vector<E>> {
    &self.left
  }
}
