use super::{
  context::StaticScope,
  thunk::{Thunk, ThunkRef},
  value::Value,
  Eval,
};
use crate::{
  derivation::Derivation,
  store::{self, hash_str},
  syntax::expr::Ident,
  util::*,
};
use std::rc::Rc;

fn required(attrs: &StaticScope, name: &str) -> Result<ThunkRef> {
  attrs
    .get(name)
    .cloned()
    .ok_or_else(|| anyhow!("required attribute `{}' missing", name))
}

/// `derivation attrs`: computes the store paths of the derivation described
/// by `attrs` and returns `attrs` extended with them.
pub fn prim_derivation(eval: &Eval, args: Vec<ThunkRef>) -> Result<Value> {
  let attrs = eval.value_attrs_of(&args[0])?.clone();

  let name = eval
    .value_string_of(&*required(&attrs, "name")?)
    .context("while evaluating the derivation name")?
    .to_owned();
  if name.ends_with(".drv") {
    bail!("derivation names are not allowed to end in `.drv'");
  }
  store::check_name(&name)?;
  required(&attrs, "builder")?;
  required(&attrs, "system")?;

  let mut drv = Derivation::new(name.as_str());
  let mut outputs = vec![String::from("out")];

  for (key, value) in attrs.iter() {
    let in_attr = || format!("while evaluating the attribute `{}' of the derivation `{}'", key, name);
    match &**key {
      "args" => {
        for arg in eval.value_list_of(value).with_context(in_attr)?.iter() {
          drv.args.push(eval.coerce_to_string(arg).with_context(in_attr)?);
        }
      }
      _ => {
        let s = eval.coerce_to_string(value).with_context(in_attr)?;
        match &**key {
          "builder" => drv.builder = s.clone(),
          "system" => drv.platform = s.clone(),
          "outputs" => outputs = parse_outputs(&s)?,
          _ => {}
        }
        drv.env.insert(key.to_string(), s);
      }
    }
  }

  for out in &outputs {
    drv.add_output(out.as_str());
  }

  let masked_hash = hash_str(&drv.unparse(true));
  for out in &outputs {
    let path = eval.store.make_output_path(out, &masked_hash, &name)?;
    drv.set_output_path(out, eval.store.print_store_path(&path));
  }

  let drv_path = eval
    .store
    .make_text_path(&format!("{}.drv", name), &hash_str(&drv.unparse(false)), &[])?;
  let drv_path = eval.store.print_store_path(&drv_path);
  debug!("instantiated `{}' -> {}", name, drv_path);

  let mut result = (*attrs).clone();
  for out in &outputs {
    let path = drv.outputs.get(out).cloned().unwrap_or_default();
    result.insert(Ident::from(out.as_str()), Thunk::complete(Value::string(path)));
  }
  let out_path = drv.outputs.get(&outputs[0]).cloned().unwrap_or_default();
  result.insert(Ident::from("outPath"), Thunk::complete(Value::string(out_path)));
  result.insert(Ident::from("drvPath"), Thunk::complete(Value::string(drv_path)));
  result.insert(Ident::from("type"), Thunk::complete(Value::string("derivation")));
  Ok(Value::AttrSet(Rc::new(result)))
}

fn parse_outputs(s: &str) -> Result<Vec<String>> {
  let mut outputs: Vec<String> = vec![];
  for out in s.split_whitespace() {
    if out == "drv" {
      bail!("invalid derivation output name `drv'");
    }
    if outputs.iter().any(|o| o == out) {
      bail!("duplicate derivation output `{}'", out);
    }
    outputs.push(out.to_owned());
  }
  if outputs.is_empty() {
    bail!("derivation cannot have an empty set of outputs");
  }
  Ok(outputs)
}
