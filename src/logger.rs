use crate::util::*;

/// Installs the global logger. The filter is read from `RUST_LOG`.
pub fn init() -> Result<()> {
  pretty_env_logger::try_init()?;
  Ok(())
}
