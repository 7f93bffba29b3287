use super::{
  context::StaticScope,
  operators::is_derivation,
  thunk::{Thunk, ThunkCell, ThunkRef},
  value::Value,
  Eval,
};
use crate::{
  jobs::{DrvInfo, Evaluator, Formal, Introspect, Pattern, Shape},
  syntax::expr::{Ident, LambdaArg},
  util::*,
};
use im::OrdMap;
use std::rc::Rc;

impl Evaluator for Eval {
  type Expr = ThunkRef;

  fn force(&self, expr: &ThunkRef) -> Result<Shape<ThunkRef>> {
    Ok(match self.value_of(expr)? {
      Value::AttrSet(attrs) => Shape::AttrSet(
        attrs
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect(),
      ),
      Value::Lambda { lambda, .. } => Shape::Function(match &lambda.arg {
        LambdaArg::Plain(_) => Pattern::Plain,
        LambdaArg::Formals { formals, .. } => Pattern::Formals(
          formals
            .formals
            .iter()
            .map(|f| Formal::new(f.name.clone(), f.def.is_some()))
            .collect(),
        ),
      }),
      Value::List(_) | Value::Primop(..) => Shape::Opaque,
      _ => Shape::Scalar,
    })
  }

  fn call_with_args(&self, fun: &ThunkRef, args: &OrdMap<Ident, ThunkRef>) -> ThunkRef {
    let args: StaticScope = args.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    Thunk::new(ThunkCell::Apply(
      fun.clone(),
      Thunk::complete(Value::AttrSet(Rc::new(args))),
    ))
  }

  fn show(&self, expr: &ThunkRef) -> String {
    Eval::show(self, expr)
  }
}

impl Introspect for Eval {
  fn derivation(&self, expr: &ThunkRef) -> Result<Option<DrvInfo>> {
    let attrs = match self.value_of(expr)? {
      Value::AttrSet(a) => a.clone(),
      _ => return Ok(None),
    };
    if !is_derivation(self, &attrs)? {
      return Ok(None);
    }

    let string_attr = |name: &str| -> Result<Option<String>> {
      match attrs.get(name) {
        Some(t) => Ok(Some(self.coerce_to_string(t)?)),
        None => Ok(None),
      }
    };

    let meta = match attrs.get("meta") {
      Some(m) => Some(self.value_attrs_of(m)?.clone()),
      None => None,
    };
    let meta_string = |name: &str| -> Result<String> {
      let value = match meta.as_ref().and_then(|m| m.get(name)) {
        Some(t) => self.value_of(t)?,
        None => return Ok(String::new()),
      };
      Ok(match value {
        Value::String(s) => s.clone(),
        _ => String::new(),
      })
    };

    Ok(Some(DrvInfo {
      system: string_attr("system")?.unwrap_or_else(|| "unknown".into()),
      drv_path: string_attr("drvPath")?.unwrap_or_default(),
      out_path: string_attr("outPath")?.unwrap_or_default(),
      description: meta_string("description")?,
      long_description: meta_string("longDescription")?,
      license: meta_string("license")?,
      homepage: meta_string("homepage")?,
    }))
  }
}
