use crate::syntax::{expr::Ident, Pos};

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
  #[error("undefined variable `{name}' at {pos}")]
  UndefinedVariable { name: Ident, pos: Pos },
  #[error("attribute `{name}' missing at {pos}")]
  MissingAttribute { name: Ident, pos: Pos },
  #[error("assertion failed at {0}")]
  AssertionFailed(Pos),
  #[error("value is {got} while {expected} was expected")]
  TypeMismatch {
    expected: &'static str,
    got: &'static str,
  },
  #[error("function at {pos} called without required argument `{name}'")]
  MissingArgument { name: Ident, pos: Pos },
  #[error("function at {pos} called with unexpected argument `{name}'")]
  UnexpectedArgument { name: Ident, pos: Pos },
  #[error("attempt to call something which is not a function but {0}")]
  NotAFunction(&'static str),
  #[error("infinite recursion encountered")]
  InfiniteRecursion,
  #[error("division by zero")]
  DivisionByZero,
  #[error("{0}")]
  Thrown(String),
  #[error("evaluation aborted with the following error message: `{0}'")]
  Aborted(String),
}
