use super::{ArgumentSet, EvalError, Formal, Introspect, Job, JobError, Pattern, Shape};
use crate::{sink::JobSink, syntax::expr::Ident};
use im::OrdMap;
use std::collections::BTreeMap;

/// Why a node of the walk failed. Evaluation failures stay local to the node
/// and become error records, sink failures end the walk.
enum Failure {
  Eval(anyhow::Error),
  Sink(anyhow::Error),
}

impl From<JobError> for Failure {
  fn from(e: JobError) -> Self {
    Failure::Eval(e.into())
  }
}

type Step = Result<(), Failure>;

/// Result of walking a node once its evaluation failures have been recorded.
/// The only error left is a sink failure.
type Walked = anyhow::Result<()>;

pub struct JobFinder<'a, E: Introspect, S: JobSink + ?Sized> {
  eval: &'a E,
  sink: &'a mut S,
  show_trace: bool,
}

impl<'a, E: Introspect, S: JobSink + ?Sized> JobFinder<'a, E, S> {
  pub fn new(eval: &'a E, sink: &'a mut S) -> Self {
    Self {
      eval,
      sink,
      show_trace: false,
    }
  }

  /// Report the full context chain of evaluation errors instead of only the
  /// innermost message.
  pub fn show_trace(mut self, show_trace: bool) -> Self {
    self.show_trace = show_trace;
    self
  }

  /// Walks `root`, sending every job and error to the sink. Only sink
  /// failures are returned.
  pub fn run(&mut self, args: &ArgumentSet<E::Expr>, root: &E::Expr) -> anyhow::Result<()> {
    self.find_jobs_wrapped(args, root, "")
  }

  fn find_jobs_wrapped(&mut self, args: &ArgumentSet<E::Expr>, expr: &E::Expr, attr_path: &str) -> Walked {
    debug!("at path `{}'", attr_path);
    match self.find_jobs(args, expr, attr_path) {
      Ok(()) => Ok(()),
      Err(Failure::Eval(e)) => self.emit_error(args, attr_path, &e),
      Err(Failure::Sink(e)) => Err(e),
    }
  }

  fn find_jobs(&mut self, args: &ArgumentSet<E::Expr>, expr: &E::Expr, attr_path: &str) -> Step {
    match self.eval.force(expr).map_err(Failure::Eval)? {
      Shape::AttrSet(members) => {
        if let Some(info) = self.eval.derivation(expr).map_err(Failure::Eval)? {
          let job = Job::new(attr_path.to_owned(), info, self.args_used(args));
          return self.sink.job(&job).map_err(Failure::Sink);
        }
        for (name, member) in &members {
          let path = if attr_path.is_empty() {
            name.to_string()
          } else {
            format!("{}.{}", attr_path, name)
          };
          self.find_jobs_wrapped(args, member, &path).map_err(Failure::Sink)?;
        }
        Ok(())
      }
      Shape::Function(Pattern::Formals(formals)) => {
        self.try_job_alts(args, attr_path, expr, &formals, &OrdMap::new()).map_err(Failure::Sink)
      }
      Shape::Function(Pattern::Plain) | Shape::Scalar | Shape::Opaque => {
        Err(JobError::UnknownValue(self.eval.show(expr)).into())
      }
    }
  }

  /// Calls `fun` once for every combination of candidates for its formals.
  /// The first formal varies slowest.
  fn try_job_alts(
    &mut self,
    args: &ArgumentSet<E::Expr>,
    attr_path: &str,
    fun: &E::Expr,
    formals: &[Formal],
    actual_args: &OrdMap<Ident, E::Expr>,
  ) -> Walked {
    let (first, rest) = match formals.split_first() {
      Some(x) => x,
      None => {
        let applied = self.eval.call_with_args(fun, actual_args);
        return self.find_jobs_wrapped(args, &applied, attr_path);
      }
    };

    match args.candidates(&first.name) {
      Some(candidates) => {
        for value in candidates.iter() {
          let branch = args.fork().bind(&first.name, value.clone());
          let actual = actual_args.update(first.name.clone(), value.clone());
          self.try_job_alts(&branch, attr_path, fun, rest, &actual)?;
        }
        Ok(())
      }
      None if first.has_default => self.try_job_alts(args, attr_path, fun, rest, actual_args),
      None => {
        let e = JobError::UnboundParameter(first.name.clone()).into();
        self.emit_error(args, attr_path, &e)
      }
    }
  }

  fn emit_error(&mut self, args: &ArgumentSet<E::Expr>, attr_path: &str, e: &anyhow::Error) -> Walked {
    let msg = if self.show_trace {
      format!("{:#}", e)
    } else {
      e.root_cause().to_string()
    };
    debug!("error at `{}': {}", attr_path, msg);
    let err = EvalError {
      location: attr_path.to_owned(),
      msg,
      args_used: self.args_used(args),
    };
    self.sink.error(&err)
  }

  fn args_used(&self, args: &ArgumentSet<E::Expr>) -> BTreeMap<String, String> {
    args
      .used()
      .iter()
      .map(|(name, value)| (name.to_string(), self.eval.show(value)))
      .collect()
  }
}
