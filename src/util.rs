pub use anyhow::{anyhow, bail, ensure, Context as _, Error, Result};
