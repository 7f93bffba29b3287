//! Ties the evaluator, the walker and an output sink together for one run.

use crate::{
  eval::{thunk::ThunkRef, Eval},
  jobs::{ArgumentSet, JobFinder},
  prelude::*,
  settings::{ArgSpec, ArgValue},
};
use std::io::Write;

/// Evaluates the caller-supplied arguments into candidate sets. Every
/// `--arg` expression is parsed up front, so malformed input fails before
/// anything is written.
pub fn argument_set(eval: &Eval, specs: &[ArgSpec]) -> Result<ArgumentSet<ThunkRef>> {
  let mut args = ArgumentSet::new();
  for spec in specs {
    let value = match &spec.value {
      ArgValue::Expr(src) => eval
        .load_inline(src)
        .with_context(|| format!("while parsing the value of argument `{}'", spec.name))?,
      ArgValue::Str(s) => eval.new_string(s.as_str()),
    };
    args.push_candidate(Ident::from(spec.name.as_str()), value);
  }
  Ok(args)
}

/// Writes the job document for `release_expr` to `out`. Evaluation failures
/// inside the release expression end up in the document; only setup and
/// output failures are returned.
pub fn eval_release<W: Write>(
  settings: &Settings,
  specs: &[ArgSpec],
  release_expr: &Path,
  out: W,
) -> Result<()> {
  let store = Store::open(&settings.store_dir)?;
  let eval = Eval::new(store);
  let args = argument_set(&eval, specs)?;
  let root = eval.load_file(release_expr)?;
  info!("evaluating `{}'", release_expr.display());

  let mut sink = settings.format.sink(out)?;
  JobFinder::new(&eval, &mut *sink)
    .show_trace(settings.show_trace)
    .run(&args, &root)?;
  sink.finish()
}
