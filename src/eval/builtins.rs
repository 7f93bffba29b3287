use super::{
  context::StaticScope,
  error::ErrorKind,
  primop::{Primop, PrimopFn},
  thunk::{Thunk, ThunkCell, ThunkRef},
  value::Value,
  Eval,
};
use crate::{syntax::expr::Ident, util::*};
use std::rc::Rc;

#[derive(Default)]
struct BaseEnv {
  toplevel: StaticScope,
  builtins: StaticScope,
}

impl BaseEnv {
  /// Names starting with `__` are only reachable through `builtins`, with the
  /// prefix stripped.
  fn add_constant(&mut self, name: &'static str, v: Value) {
    let t = Thunk::complete(v);
    let short = name.trim_start_matches("__");
    if short.len() == name.len() {
      self.toplevel.insert(Ident::from(name), t.clone());
    }
    self.builtins.insert(Ident::from(short), t);
  }

  fn add_primop(&mut self, name: &'static str, arity: usize, op: PrimopFn) {
    let primop = Primop {
      name: name.trim_start_matches("__"),
      arity,
      op,
    };
    self.add_constant(name, Value::Primop(Rc::new(primop), vec![]));
  }
}

pub fn current_system() -> String {
  format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
}

/// The scope every file is evaluated in.
pub fn base_env() -> StaticScope {
  let mut env = BaseEnv::default();

  env.add_constant("true", Value::Bool(true));
  env.add_constant("false", Value::Bool(false));
  env.add_constant("null", Value::Null);
  env.add_constant("__currentSystem", Value::string(current_system()));

  env.add_primop("throw", 1, prim_throw);
  env.add_primop("abort", 1, prim_abort);
  env.add_primop("import", 1, prim_import);
  env.add_primop("toString", 1, prim_to_string);
  env.add_primop("map", 2, prim_map);
  env.add_primop("derivation", 1, super::derivation::prim_derivation);
  env.add_primop("__attrNames", 1, prim_attr_names);
  env.add_primop("__listToAttrs", 1, prim_list_to_attrs);
  env.add_primop("__length", 1, prim_length);
  env.add_primop("__head", 1, prim_head);
  env.add_primop("__isAttrs", 1, prim_is_attrs);
  env.add_primop("__isFunction", 1, prim_is_function);

  let BaseEnv {
    mut toplevel,
    builtins,
  } = env;
  toplevel.insert(
    Ident::from("builtins"),
    Thunk::complete(Value::AttrSet(Rc::new(builtins))),
  );
  toplevel
}

fn prim_throw(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  bail!(ErrorKind::Thrown(eval.value_string_of(&args[0])?.to_owned()))
}

fn prim_abort(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  bail!(ErrorKind::Aborted(eval.value_string_of(&args[0])?.to_owned()))
}

fn prim_import(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  let mut path = match eval.value_of(&args[0])? {
    Value::Path(p) => p.clone(),
    Value::String(s) if s.starts_with('/') => s.into(),
    v => bail!("cannot import {}", v.typename()),
  };
  if path.is_dir() {
    path.push("default.nix");
  }
  let t = eval.load_file(&path)?;
  Ok(eval.value_of(&t)?.clone())
}

fn prim_to_string(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  Ok(Value::String(eval.coerce_to_string(&args[0])?))
}

fn prim_map(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  let items = eval.value_list_of(&args[1])?;
  Ok(Value::List(Rc::new(
    items
      .iter()
      .map(|item| Thunk::new(ThunkCell::Apply(args[0].clone(), item.clone())))
      .collect(),
  )))
}

fn prim_attr_names(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  let mut names: Vec<&Ident> = eval.value_attrs_of(&args[0])?.keys().collect();
  names.sort();
  Ok(Value::List(Rc::new(
    names
      .into_iter()
      .map(|n| Thunk::complete(Value::string(n.to_string())))
      .collect(),
  )))
}

fn prim_list_to_attrs(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  let mut attrs = StaticScope::new();
  for item in eval.value_list_of(&args[0])?.iter() {
    let pair = eval.value_attrs_of(item)?;
    let name = match pair.get("name") {
      Some(n) => eval.value_string_of(n)?,
      None => bail!("attribute `name' missing in a call to `listToAttrs'"),
    };
    let value = match pair.get("value") {
      Some(v) => v.clone(),
      None => bail!("attribute `value' missing in a call to `listToAttrs'"),
    };
    // the first occurrence of a name wins
    attrs.entry(Ident::from(name)).or_insert(value);
  }
  Ok(Value::AttrSet(Rc::new(attrs)))
}

fn prim_length(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  Ok(Value::Int(eval.value_list_of(&args[0])?.len() as i64))
}

fn prim_head(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  match eval.value_list_of(&args[0])?.first() {
    Some(t) => Ok(eval.value_of(t)?.clone()),
    None => bail!("`head' called on an empty list"),
  }
}

fn prim_is_attrs(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  Ok(Value::Bool(matches!(eval.value_of(&args[0])?, Value::AttrSet(_))))
}

fn prim_is_function(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  Ok(Value::Bool(eval.value_of(&args[0])?.is_function()))
}
