// quire/src/revision.rs

//! Revision requests and their audit trail. A request is created when an
//! editor asks for minor or major revisions; the author works against it,
//! every notable action is logged on the request, and completion hands
//! the article back to the editors.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::{Event, EventBus, NotificationContext, RevisionPayload};
use crate::identity::{RoleDirectory, UserId};
use crate::store::ArticleStore;
use crate::submission::{ArticleId, Stage};

/// Default grace period an author gets to revise.
pub const DEFAULT_REVISION_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevisionId(pub u64);

impl fmt::Display for RevisionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionType {
  MinorRevisions,
  MajorRevisions,
}

impl RevisionType {
  pub fn slug(&self) -> &'static str {
    match self {
      RevisionType::MinorRevisions => "minor_revisions",
      RevisionType::MajorRevisions => "major_revisions",
    }
  }
}

impl fmt::Display for RevisionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

/// One entry in the request's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionAction {
  pub text: String,
  pub logged: DateTime<Utc>,
  pub actor: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionRequest {
  pub id: RevisionId,
  pub editor: UserId,
  pub revision_type: RevisionType,
  pub editor_note: String,
  pub author_note: Option<String>,
  pub date_requested: DateTime<Utc>,
  pub date_due: DateTime<Utc>,
  pub date_completed: Option<DateTime<Utc>>,
  pub actions: Vec<RevisionAction>,
}

impl RevisionRequest {
  pub(crate) fn new(
    id: RevisionId,
    editor: UserId,
    revision_type: RevisionType,
    editor_note: String,
    date_due: Option<DateTime<Utc>>,
  ) -> Self {
    let now = Utc::now();
    Self {
      id,
      editor,
      revision_type,
      editor_note,
      author_note: None,
      date_requested: now,
      date_due: date_due.unwrap_or(now + Duration::days(DEFAULT_REVISION_DAYS)),
      date_completed: None,
      actions: Vec::new(),
    }
  }

  pub fn is_complete(&self) -> bool {
    self.date_completed.is_some()
  }
}

pub struct RevisionManager {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  roles: Arc<dyn RoleDirectory>,
}

impl RevisionManager {
  pub fn new(store: Arc<ArticleStore>, bus: Arc<EventBus>, roles: Arc<dyn RoleDirectory>) -> Self {
    Self { store, bus, roles }
  }

  /// Appends an audit entry (file replaced, note left, ...) to an
  /// outstanding request.
  pub fn log_action(
    &self,
    article_id: ArticleId,
    revision: RevisionId,
    actor: UserId,
    text: impl Into<String>,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let request = article
      .revision_requests
      .iter_mut()
      .find(|r| r.id == revision)
      .ok_or_else(|| QuireError::not_found("revision request", revision))?;
    if request.is_complete() {
      return Err(QuireError::precondition(
        "log_revision_action",
        article_id,
        "an outstanding revision request",
        "request already complete",
      ));
    }
    request.actions.push(RevisionAction {
      text: text.into(),
      logged: Utc::now(),
      actor,
    });
    Ok(())
  }

  pub fn update_due_date(
    &self,
    article_id: ArticleId,
    revision: RevisionId,
    editor: UserId,
    date_due: DateTime<Utc>,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let journal = article.journal;
    if !self.roles.is_editor(editor, journal) {
      return Err(QuireError::NotAnEditor {
        user: editor,
        journal,
      });
    }
    let request = article
      .revision_requests
      .iter_mut()
      .find(|r| r.id == revision)
      .ok_or_else(|| QuireError::not_found("revision request", revision))?;
    if request.is_complete() {
      return Err(QuireError::precondition(
        "update_revision_due_date",
        article_id,
        "an outstanding revision request",
        "request already complete",
      ));
    }
    request.date_due = date_due;
    Ok(())
  }

  /// The author declares the revisions done. Only the submitting author
  /// may do this, and only once per request.
  pub fn complete_revisions(
    &self,
    article_id: ArticleId,
    revision: RevisionId,
    author: UserId,
    author_note: Option<String>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if article.owner != author {
        return Err(QuireError::precondition(
          "complete_revisions",
          article_id,
          "the submitting author",
          format!("user {author}"),
        ));
      }
      let request = article
        .revision_requests
        .iter_mut()
        .find(|r| r.id == revision)
        .ok_or_else(|| QuireError::not_found("revision request", revision))?;
      if request.is_complete() {
        return Err(QuireError::precondition(
          "complete_revisions",
          article_id,
          "an outstanding revision request",
          "request already complete",
        ));
      }
      let now = Utc::now();
      request.date_completed = Some(now);
      request.author_note = author_note;
      request.actions.push(RevisionAction {
        text: "Revisions submitted by author".to_string(),
        logged: now,
        actor: author,
      });
      events.push(Event::RevisionsComplete(RevisionPayload {
        article: article_id,
        revision,
        revision_type: request.revision_type,
        date_due: request.date_due,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Removes an outstanding request. A rationale is mandatory and logged.
  /// If this was the last outstanding request and the article still sits
  /// at Under Revision, it returns to Under Review.
  pub fn delete(
    &self,
    article_id: ArticleId,
    revision: RevisionId,
    editor: UserId,
    rationale: &str,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.is_editor(editor, journal) {
        return Err(QuireError::NotAnEditor {
          user: editor,
          journal,
        });
      }
      if rationale.trim().is_empty() {
        return Err(QuireError::precondition(
          "delete_revision_request",
          article_id,
          "a non-empty rationale",
          "empty rationale",
        ));
      }
      let index = article
        .revision_requests
        .iter()
        .position(|r| r.id == revision)
        .ok_or_else(|| QuireError::not_found("revision request", revision))?;
      if article.revision_requests[index].is_complete() {
        return Err(QuireError::precondition(
          "delete_revision_request",
          article_id,
          "an outstanding revision request",
          "request already complete",
        ));
      }
      article.revision_requests.remove(index);
      event!(
        Level::WARN,
        article = %article_id,
        revision = %revision,
        %editor,
        rationale,
        "Revision request deleted."
      );
      if article.stage == Stage::UnderRevision && !article.is_under_revision() {
        article.set_stage(Stage::UnderReview, &mut events);
      }
    }
    self.bus.raise_all(&events)
  }
}
