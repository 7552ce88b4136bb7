// quire/src/identity.rs

//! Opaque user identity and journal-scoped role checks.
//!
//! Account storage is not an engine concern: operations that need an
//! authorization decision go through the [`RoleDirectory`] trait, and the
//! host application supplies the implementation. [`InMemoryRoles`] covers
//! tests and demos.

use std::collections::HashSet;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::journal::JournalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
  Editor,
  SectionEditor,
  Reviewer,
  Author,
  Copyeditor,
  Typesetter,
  Production,
  ProofingManager,
  Proofreader,
}

impl Role {
  pub fn slug(&self) -> &'static str {
    match self {
      Role::Editor => "editor",
      Role::SectionEditor => "section-editor",
      Role::Reviewer => "reviewer",
      Role::Author => "author",
      Role::Copyeditor => "copyeditor",
      Role::Typesetter => "typesetter",
      Role::Production => "production",
      Role::ProofingManager => "proofing-manager",
      Role::Proofreader => "proofreader",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

/// Journal-scoped role lookup, implemented by the host application.
pub trait RoleDirectory: Send + Sync {
  fn has_role(&self, user: UserId, role: Role, journal: JournalId) -> bool;

  /// Senior or section editors both count as "an editor" for gatekeeping.
  fn is_editor(&self, user: UserId, journal: JournalId) -> bool {
    self.has_role(user, Role::Editor, journal) || self.has_role(user, Role::SectionEditor, journal)
  }
}

/// Set-backed directory for tests and demos.
#[derive(Default)]
pub struct InMemoryRoles {
  grants: RwLock<HashSet<(UserId, Role, JournalId)>>,
}

impl InMemoryRoles {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn grant(&self, user: UserId, role: Role, journal: JournalId) {
    self.grants.write().insert((user, role, journal));
  }

  pub fn revoke(&self, user: UserId, role: Role, journal: JournalId) {
    self.grants.write().remove(&(user, role, journal));
  }
}

impl RoleDirectory for InMemoryRoles {
  fn has_role(&self, user: UserId, role: Role, journal: JournalId) -> bool {
    self.grants.read().contains(&(user, role, journal))
  }
}
