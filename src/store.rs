//! Store path computation.
//!
//! Nothing is ever written to the store directory: paths are derived from
//! content hashes exactly as a Nix store would name them, which is all job
//! discovery needs.

use crate::util::*;
use sha2::{Digest, Sha256};
use std::{
  fmt,
  path::{Path, PathBuf},
};

const HASH_BYTES: usize = 20;

pub type Hash = [u8; 32];

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("store directory `{}' must be an absolute path", .0.display())]
  RelativeStoreDir(PathBuf),
  #[error("invalid store path name: {0:?}")]
  InvalidStorePathName(String),
}

pub fn hash_str(s: &str) -> Hash {
  let mut h = [0u8; 32];
  h.copy_from_slice(&Sha256::digest(s.as_bytes()));
  h
}

fn base16(bytes: &[u8]) -> String {
  bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// XOR-folds `hash` down to `size` bytes.
fn compress_hash(hash: &[u8], size: usize) -> Vec<u8> {
  let mut out = vec![0u8; size];
  for (i, b) in hash.iter().enumerate() {
    out[i % size] ^= b;
  }
  out
}

pub mod base32 {
  const CHARS: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

  pub fn encoded_len(len: usize) -> usize {
    if len == 0 {
      0
    } else {
      (len * 8 - 1) / 5 + 1
    }
  }

  /// Nix's base32 variant: no padding, and the last byte comes out first.
  pub fn encode(bytes: &[u8]) -> String {
    let len = encoded_len(bytes.len());
    let mut s = String::with_capacity(len);
    for n in (0..len).rev() {
      let b = n * 5;
      let i = b / 8;
      let j = b % 8;
      let lo = u16::from(bytes[i]) >> j;
      let hi = bytes.get(i + 1).map_or(0, |&x| u16::from(x) << (8 - j));
      s.push(CHARS[usize::from((lo | hi) & 0x1f)] as char);
    }
    s
  }
}

pub fn check_name(s: &str) -> Result<(), Error> {
  fn is_valid_char(c: char) -> bool {
    c.is_ascii_alphabetic()
      || c.is_ascii_digit()
      || c == '+'
      || c == '-'
      || c == '.'
      || c == '_'
      || c == '?'
      || c == '='
  }

  if s.is_empty() || s.len() > 211 || s.starts_with('.') || !s.chars().all(is_valid_char) {
    return Err(Error::InvalidStorePathName(s.into()));
  }
  Ok(())
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StorePath {
  hash: [u8; HASH_BYTES],
  name: String,
}

impl StorePath {
  fn from_parts(bytes: &[u8], name: &str) -> Result<Self> {
    check_name(name)?;
    let mut hash = [0u8; HASH_BYTES];
    hash.copy_from_slice(&bytes[..HASH_BYTES]);
    Ok(Self {
      hash,
      name: name.to_owned(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for StorePath {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}-{}", base32::encode(&self.hash), self.name)
  }
}

#[derive(Debug, Clone)]
pub struct Store {
  store_dir: PathBuf,
}

impl Store {
  pub fn open<P: Into<PathBuf>>(store_dir: P) -> Result<Self> {
    let store_dir = store_dir.into();
    if !store_dir.is_absolute() {
      bail!(Error::RelativeStoreDir(store_dir));
    }
    debug!("using store directory {}", store_dir.display());
    Ok(Self { store_dir })
  }

  pub fn store_dir(&self) -> &Path {
    &self.store_dir
  }

  pub fn print_store_path(&self, path: &StorePath) -> String {
    format!("{}/{}", self.store_dir.display(), path)
  }

  pub fn make_store_path(&self, path_type: &str, hash: &Hash, name: &str) -> Result<StorePath> {
    let ident = format!(
      "{}:sha256:{}:{}:{}",
      path_type,
      base16(hash),
      self.store_dir.display(),
      name
    );
    StorePath::from_parts(&compress_hash(&hash_str(&ident), HASH_BYTES), name)
  }

  pub fn make_output_path(&self, id: &str, hash: &Hash, name: &str) -> Result<StorePath> {
    self.make_store_path(
      &format!("output:{}", id),
      hash,
      &if id == "out" {
        name.to_owned()
      } else {
        format!("{}-{}", name, id)
      },
    )
  }

  pub fn make_text_path(&self, name: &str, hash: &Hash, references: &[StorePath]) -> Result<StorePath> {
    let mut path_type = String::from("text");
    for r in references {
      path_type.push(':');
      path_type.push_str(&self.print_store_path(r));
    }
    self.make_store_path(&path_type, hash, name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use assert_matches::assert_matches;

  #[test]
  fn test_base32() {
    assert_eq!(base32::encode(&[]), "");
    assert_eq!(base32::encode(&[0xff]), "7z");
    assert_eq!(base32::encode(&[0u8; HASH_BYTES]).len(), 32);
  }

  #[test]
  fn test_relative_store_dir() {
    assert_matches!(
      Store::open("nix/store").unwrap_err().downcast::<Error>(),
      Ok(Error::RelativeStoreDir(_))
    );
  }

  #[test]
  fn test_store_path_names() {
    assert!(check_name("hello-2.10").is_ok());
    assert!(check_name("").is_err());
    assert!(check_name(".hidden").is_err());
    assert!(check_name("with space").is_err());
  }

  #[test]
  fn test_output_paths() -> Result<()> {
    let store = Store::open("/nix/store")?;
    let h = hash_str("Derive()");
    let out = store.make_output_path("out", &h, "hello")?;
    let dev = store.make_output_path("dev", &h, "hello")?;
    assert_eq!(out.name(), "hello");
    assert_eq!(dev.name(), "hello-dev");
    assert_ne!(out, dev);
    let printed = store.print_store_path(&out);
    assert!(printed.starts_with("/nix/store/"));
    assert_eq!(printed.len(), "/nix/store/".len() + 32 + 1 + "hello".len());
    Ok(())
  }

  #[test]
  fn test_store_dir_is_hashed() -> Result<()> {
    let h = hash_str("x");
    let a = Store::open("/nix/store")?.make_text_path("x.drv", &h, &[])?;
    let b = Store::open("/other/store")?.make_text_path("x.drv", &h, &[])?;
    assert_ne!(a, b);
    Ok(())
  }
}
