#[macro_use] extern crate log;
#[macro_use] extern crate derive_more;
#[macro_use] extern crate lazy_static;

pub mod derivation;
pub mod error;
pub mod eval;
pub mod jobs;
pub mod logger;
pub mod prelude;
pub mod release;
pub mod settings;
pub mod sink;
pub mod store;
pub mod syntax;
pub mod util;

pub use eval::Eval;
pub use jobs::{ArgumentSet, JobFinder};
pub use store::Store;
