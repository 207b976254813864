use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathItem {
  Key(String),
  Index(usize),
}

/// Which top-level output of a source a path starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRoot {
  Result,
  Bindings,
  Exports,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubvaluePath {
  pub root: PathRoot,
  pub items: Vec<PathItem>,
}

impl SubvaluePath {
  pub fn new(root: PathRoot, items: Vec<PathItem>) -> Self {
    SubvaluePath { root, items }
  }

  pub fn extend(&self, item: PathItem) -> Self {
    let mut items = self.items.clone();
    items.push(item);
    SubvaluePath { root: self.root, items }
  }

  pub fn is_root(&self) -> bool {
    self.items.is_empty()
  }
}

impl fmt::Display for SubvaluePath {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let root = match self.root {
      PathRoot::Result => "result",
      PathRoot::Bindings => "bindings",
      PathRoot::Exports => "exports",
    };
    write!(f, "{}", root)?;
    for item in &self.items {
      match item {
        PathItem::Key(k) => write!(f, ".{}", k)?,
        PathItem::Index(i) => write!(f, "[{}]", i)?,
      }
    }
    Ok(())
  }
}
