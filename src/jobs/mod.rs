//! Job discovery: walks a release expression and flattens it into job and
//! error records.
//!
//! The walker only ever looks at values through [`Evaluator`] and
//! [`Introspect`], so it can be driven by the bundled evaluator or by a
//! scripted one in tests.

use crate::syntax::expr::Ident;
use im::OrdMap;
use serde::Serialize;
use std::collections::BTreeMap;

pub mod args;
pub mod walker;

#[cfg(test)] mod tests;

pub use args::ArgumentSet;
pub use walker::JobFinder;

/// How a forced value looks to the walker.
#[derive(Debug, Clone)]
pub enum Shape<E> {
  /// Members in declaration order.
  AttrSet(Vec<(Ident, E)>),
  Function(Pattern),
  Scalar,
  Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
  Plain,
  Formals(Vec<Formal>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formal {
  pub name: Ident,
  pub has_default: bool,
}

impl Formal {
  pub fn new<I: Into<Ident>>(name: I, has_default: bool) -> Self {
    Self {
      name: name.into(),
      has_default,
    }
  }
}

pub trait Evaluator {
  type Expr: Clone;

  fn force(&self, expr: &Self::Expr) -> anyhow::Result<Shape<Self::Expr>>;

  /// Builds the (lazy) application of `fun` to an attribute set holding
  /// `args`.
  fn call_with_args(&self, fun: &Self::Expr, args: &OrdMap<Ident, Self::Expr>) -> Self::Expr;

  fn show(&self, expr: &Self::Expr) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrvInfo {
  pub system: String,
  pub drv_path: String,
  pub out_path: String,
  pub description: String,
  pub long_description: String,
  pub license: String,
  pub homepage: String,
}

pub trait Introspect: Evaluator {
  /// `Ok(None)` when `expr` is not something that can be built.
  fn derivation(&self, expr: &Self::Expr) -> anyhow::Result<Option<DrvInfo>>;
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
  #[error("unknown value: {0}")]
  UnknownValue(String),
  #[error("cannot auto-call a function that has an argument without a default value (`{0}')")]
  UnboundParameter(Ident),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
  pub name: String,
  pub system: String,
  pub drv_path: String,
  pub out_path: String,
  pub description: String,
  pub long_description: String,
  pub license: String,
  pub homepage: String,
  pub args_used: BTreeMap<String, String>,
}

impl Job {
  pub fn new(name: String, info: DrvInfo, args_used: BTreeMap<String, String>) -> Self {
    Self {
      name,
      system: info.system,
      drv_path: info.drv_path,
      out_path: info.out_path,
      description: info.description,
      long_description: info.long_description,
      license: info.license,
      homepage: info.homepage,
      args_used,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalError {
  pub location: String,
  pub msg: String,
  pub args_used: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
  Job(Job),
  Error(EvalError),
}

impl Record {
  pub fn location(&self) -> &str {
    match self {
      Record::Job(j) => &j.name,
      Record::Error(e) => &e.location,
    }
  }

  pub fn args_used(&self) -> &BTreeMap<String, String> {
    match self {
      Record::Job(j) => &j.args_used,
      Record::Error(e) => &e.args_used,
    }
  }
}
