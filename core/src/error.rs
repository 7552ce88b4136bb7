// quire/src/error.rs

use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::decision::DraftId;
use crate::identity::{Role, UserId};
use crate::journal::JournalId;
use crate::submission::ArticleId;

#[derive(Debug, Error)]
pub enum QuireError {
  #[error("{operation}: article {article} requires {expected}, but found {actual}")]
  Precondition {
    operation: &'static str,
    article: ArticleId,
    expected: String,
    actual: String,
  },

  #[error("User {user} already holds this assignment on article {article}")]
  DuplicateAssignment { article: ArticleId, user: UserId },

  #[error("User {user} does not hold the reviewer role on journal {journal}")]
  NotAReviewer { user: UserId, journal: JournalId },

  #[error("User {user} does not hold an editor role on journal {journal}")]
  NotAnEditor { user: UserId, journal: JournalId },

  #[error("User {user} does not hold the {role} role on journal {journal}")]
  MissingRole {
    user: UserId,
    role: Role,
    journal: JournalId,
  },

  #[error("Review round {round} of article {article} has no review files")]
  NoReviewFiles { article: ArticleId, round: u32 },

  #[error("Decision draft {draft} of article {article} has already been actioned")]
  AlreadyActioned { article: ArticleId, draft: DraftId },

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("Error in user-provided handler for event '{event}'. Source: {source}")]
  Handler {
    event: &'static str,
    #[source]
    source: AnyhowError,
  },
}

impl QuireError {
  pub(crate) fn precondition(
    operation: &'static str,
    article: ArticleId,
    expected: impl Into<String>,
    actual: impl std::fmt::Display,
  ) -> Self {
    QuireError::Precondition {
      operation,
      article,
      expected: expected.into(),
      actual: actual.to_string(),
    }
  }

  pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
    QuireError::NotFound {
      entity,
      id: id.to_string(),
    }
  }
}

pub type QuireResult<T, E = QuireError> = std::result::Result<T, E>;
