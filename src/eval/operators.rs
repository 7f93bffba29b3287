use super::{
  context::Context,
  error::ErrorKind,
  thunk::{Thunk, ThunkRef},
  value::Value,
  Eval,
};
use crate::{
  syntax::expr::{Bin, ExprRef},
  util::*,
};
use std::{cmp::Ordering, rc::Rc};

pub fn eval_binary(
  eval: &Eval,
  bin: Bin,
  lhs: &ExprRef,
  rhs: &ExprRef,
  context: &Context,
) -> Result<Value> {
  macro_rules! t {
    ($x:expr) => {
      Thunk::thunk($x.clone(), context.clone())
    };
  }

  match bin {
    Bin::Or => {
      if eval.value_bool_of(&t!(lhs))? {
        Ok(Value::Bool(true))
      } else {
        Ok(Value::Bool(eval.value_bool_of(&t!(rhs))?))
      }
    }
    Bin::And => {
      if eval.value_bool_of(&t!(lhs))? {
        Ok(Value::Bool(eval.value_bool_of(&t!(rhs))?))
      } else {
        Ok(Value::Bool(false))
      }
    }
    Bin::Impl => {
      if eval.value_bool_of(&t!(lhs))? {
        Ok(Value::Bool(eval.value_bool_of(&t!(rhs))?))
      } else {
        Ok(Value::Bool(true))
      }
    }
    Bin::Eq => Ok(Value::Bool(eval_eq(eval, &t!(lhs), &t!(rhs))?)),
    Bin::Neq => Ok(Value::Bool(!eval_eq(eval, &t!(lhs), &t!(rhs))?)),
    Bin::Lt => Ok(Value::Bool(less_than(eval, &t!(lhs), &t!(rhs))?)),
    Bin::Gt => Ok(Value::Bool(less_than(eval, &t!(rhs), &t!(lhs))?)),
    Bin::Leq => Ok(Value::Bool(!less_than(eval, &t!(rhs), &t!(lhs))?)),
    Bin::Geq => Ok(Value::Bool(!less_than(eval, &t!(lhs), &t!(rhs))?)),
    Bin::Update => {
      let mut attrs = (**eval.value_attrs_of(&t!(lhs))?).clone();
      for (k, v) in eval.value_attrs_of(&t!(rhs))?.iter() {
        attrs.insert(k.clone(), v.clone());
      }
      Ok(Value::AttrSet(Rc::new(attrs)))
    }
    Bin::ConcatLists => {
      let mut items = eval.value_list_of(&t!(lhs))?.to_vec();
      items.extend(eval.value_list_of(&t!(rhs))?.iter().cloned());
      Ok(Value::List(Rc::new(items)))
    }
    Bin::Add => plus_operator(eval, &t!(lhs), &t!(rhs)),
    Bin::Sub | Bin::Mul | Bin::Div => {
      let a = eval.value_int_of(&t!(lhs))?;
      let b = eval.value_int_of(&t!(rhs))?;
      Ok(Value::Int(match bin {
        Bin::Sub => a.wrapping_sub(b),
        Bin::Mul => a.wrapping_mul(b),
        _ if b == 0 => bail!(ErrorKind::DivisionByZero),
        _ => a.wrapping_div(b),
      }))
    }
  }
}

fn plus_operator(eval: &Eval, lhs: &ThunkRef, rhs: &ThunkRef) -> Result<Value> {
  match (eval.value_of(lhs)?, eval.value_of(rhs)?) {
    (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
    (Value::Path(p), _) => {
      let suffix = eval.coerce_to_string(rhs)?;
      let mut joined = p.clone().into_os_string();
      joined.push(suffix);
      Ok(Value::Path(joined.into()))
    }
    (Value::String(a), _) => Ok(Value::String(format!("{}{}", a, eval.coerce_to_string(rhs)?))),
    (a, b) => bail!("cannot add {} to {}", b.typename(), a.typename()),
  }
}

/// Structural equality. Derivations compare by output path, functions are
/// never equal.
pub fn eval_eq(eval: &Eval, lhs: &ThunkRef, rhs: &ThunkRef) -> Result<bool> {
  if Rc::ptr_eq(lhs, rhs) {
    return Ok(true);
  }
  Ok(match (eval.value_of(lhs)?, eval.value_of(rhs)?) {
    (Value::Null, Value::Null) => true,
    (Value::Bool(a), Value::Bool(b)) => a == b,
    (Value::Int(a), Value::Int(b)) => a == b,
    (Value::String(a), Value::String(b)) => a == b,
    (Value::Path(a), Value::Path(b)) => a == b,
    (Value::List(a), Value::List(b)) => {
      if a.len() != b.len() {
        return Ok(false);
      }
      for (x, y) in a.iter().zip(b.iter()) {
        if !eval_eq(eval, x, y)? {
          return Ok(false);
        }
      }
      true
    }
    (Value::AttrSet(a), Value::AttrSet(b)) => {
      if is_derivation(eval, a)? && is_derivation(eval, b)? {
        if let (Some(x), Some(y)) = (a.get("outPath"), b.get("outPath")) {
          return eval_eq(eval, x, y);
        }
      }
      if a.len() != b.len() {
        return Ok(false);
      }
      for (k, x) in a.iter() {
        match b.get(k) {
          Some(y) => {
            if !eval_eq(eval, x, y)? {
              return Ok(false);
            }
          }
          None => return Ok(false),
        }
      }
      true
    }
    _ => false,
  })
}

pub fn is_derivation(eval: &Eval, attrs: &super::context::StaticScope) -> Result<bool> {
  match attrs.get("type") {
    Some(t) => Ok(matches!(eval.value_of(t)?, Value::String(s) if s == "derivation")),
    None => Ok(false),
  }
}

fn less_than(eval: &Eval, lhs: &ThunkRef, rhs: &ThunkRef) -> Result<bool> {
  let ord = match (eval.value_of(lhs)?, eval.value_of(rhs)?) {
    (Value::Int(a), Value::Int(b)) => a.cmp(b),
    (Value::String(a), Value::String(b)) => a.cmp(b),
    (Value::Path(a), Value::Path(b)) => a.cmp(b),
    (a, b) => bail!("cannot compare {} with {}", a.typename(), b.typename()),
  };
  Ok(ord == Ordering::Less)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Store;

  fn eval_str(src: &str) -> Result<Value> {
    let eval = Eval::new(Store::open("/nix/store")?);
    let t = eval.load_inline(src)?;
    Ok(eval.value_of(&t)?.clone())
  }

  #[test]
  fn test_arithmetic() -> Result<()> {
    assert_matches::assert_matches!(eval_str("1 + 2 * 3 - 8 / 2")?, Value::Int(3));
    assert!(eval_str("1 / 0").is_err());
    Ok(())
  }

  #[test]
  fn test_equality() -> Result<()> {
    assert_matches::assert_matches!(eval_str("[ 1 { a = \"x\"; } ] == [ 1 { a = \"x\"; } ]")?, Value::Bool(true));
    assert_matches::assert_matches!(eval_str("{ a = 1; } == { a = 1; b = 2; }")?, Value::Bool(false));
    assert_matches::assert_matches!(eval_str("(x: x) == (x: x)")?, Value::Bool(false));
    Ok(())
  }

  #[test]
  fn test_update_and_concat() -> Result<()> {
    assert_matches::assert_matches!(eval_str("({ a = 1; b = 2; } // { b = 3; }).b")?, Value::Int(3));
    assert_matches::assert_matches!(eval_str("builtins.length ([ 1 ] ++ [ 2 3 ])")?, Value::Int(3));
    Ok(())
  }

  #[test]
  fn test_comparison() -> Result<()> {
    assert_matches::assert_matches!(eval_str("\"abc\" < \"abd\"")?, Value::Bool(true));
    assert_matches::assert_matches!(eval_str("2 >= 3")?, Value::Bool(false));
    assert!(eval_str("1 < \"a\"").is_err());
    Ok(())
  }
}
