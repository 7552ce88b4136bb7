// quire/src/journal.rs

//! Minimal journal identity. Roles and workflow configuration are scoped
//! per journal; everything else about a journal lives outside the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JournalId(pub u64);

impl fmt::Display for JournalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
  pub id: JournalId,
  pub code: String,
  pub name: String,
}

impl Journal {
  pub fn new(id: JournalId, code: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id,
      code: code.into(),
      name: name.into(),
    }
  }
}
