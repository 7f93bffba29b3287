use std::collections::BTreeMap;

mod print;

/// The store-level form of a derivation, as produced by the `derivation`
/// builtin. Output paths are empty strings until they have been computed.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
  pub name: String,
  pub builder: String,
  pub platform: String,
  pub args: Vec<String>,
  pub env: BTreeMap<String, String>,
  pub outputs: BTreeMap<String, String>,
}

impl Derivation {
  pub fn new<S: Into<String>>(name: S) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  pub fn add_output<S: Into<String>>(&mut self, id: S) {
    let id = id.into();
    self.env.insert(id.clone(), String::new());
    self.outputs.insert(id, String::new());
  }

  pub fn set_output_path(&mut self, id: &str, path: String) {
    self.env.insert(id.to_owned(), path.clone());
    self.outputs.insert(id.to_owned(), path);
  }
}
