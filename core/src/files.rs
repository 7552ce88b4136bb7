// quire/src/files.rs

//! Opaque file references. The engine records which files belong to a
//! manuscript, a review round or a task, but never touches bytes; storage
//! goes through the [`FileStore`] trait.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef(pub Uuid);

impl FileRef {
  pub fn new() -> Self {
    FileRef(Uuid::new_v4())
  }
}

impl Default for FileRef {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for FileRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Byte storage seam, implemented by the host application.
pub trait FileStore: Send + Sync {
  fn save_file(&self, owner: UserId, label: &str, bytes: Vec<u8>) -> FileRef;

  fn serve_file(&self, file: FileRef) -> Option<Vec<u8>>;
}

struct StoredFile {
  #[allow(dead_code)]
  owner: UserId,
  #[allow(dead_code)]
  label: String,
  bytes: Vec<u8>,
}

/// Map-backed store for tests and demos.
#[derive(Default)]
pub struct InMemoryFiles {
  files: RwLock<HashMap<FileRef, StoredFile>>,
}

impl InMemoryFiles {
  pub fn new() -> Self {
    Self::default()
  }
}

impl FileStore for InMemoryFiles {
  fn save_file(&self, owner: UserId, label: &str, bytes: Vec<u8>) -> FileRef {
    let file = FileRef::new();
    self.files.write().insert(
      file,
      StoredFile {
        owner,
        label: label.to_string(),
        bytes,
      },
    );
    file
  }

  fn serve_file(&self, file: FileRef) -> Option<Vec<u8>> {
    self.files.read().get(&file).map(|stored| stored.bytes.clone())
  }
}
