pub use crate::{
  settings::Settings,
  store::Store,
  syntax::{expr::Ident, Pos},
  util::*,
};
pub use std::{
  cell::RefCell,
  collections::BTreeMap,
  fmt::{self, Debug, Display},
  path::{Path, PathBuf},
  rc::Rc,
};
