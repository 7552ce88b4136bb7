// quire/src/decision.rs

//! Decision drafts: section editors record a recommended decision, a
//! senior editor approves or declines it. Approval claims the draft with
//! a compare-and-set on `closed` under the article lock, then actions the
//! decision through the state machine, so two editors racing on the same
//! draft can never action it twice.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::{DraftPayload, Event, EventBus, NotificationContext};
use crate::identity::{RoleDirectory, UserId};
use crate::lifecycle::ArticleLifecycle;
use crate::revision::RevisionType;
use crate::store::ArticleStore;
use crate::submission::ArticleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DraftId(pub u64);

impl fmt::Display for DraftId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// An editorial decision on the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
  Accept,
  Decline,
  MinorRevisions,
  MajorRevisions,
}

impl Decision {
  pub fn slug(&self) -> &'static str {
    match self {
      Decision::Accept => "accept",
      Decision::Decline => "decline",
      Decision::MinorRevisions => "minor_revisions",
      Decision::MajorRevisions => "major_revisions",
    }
  }
}

impl fmt::Display for Decision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

/// What the senior editor did with the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftVerdict {
  Accepted,
  Declined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionDraft {
  pub id: DraftId,
  pub section_editor: UserId,
  pub decision: Decision,
  pub rationale: String,
  pub drafted: DateTime<Utc>,
  /// Claim flag; flipped exactly once, under the article lock.
  pub closed: bool,
  pub editor_decision: Option<DraftVerdict>,
}

pub struct DecisionManager {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  roles: Arc<dyn RoleDirectory>,
  lifecycle: ArticleLifecycle,
}

impl DecisionManager {
  pub fn new(
    store: Arc<ArticleStore>,
    bus: Arc<EventBus>,
    roles: Arc<dyn RoleDirectory>,
    lifecycle: ArticleLifecycle,
  ) -> Self {
    Self {
      store,
      bus,
      roles,
      lifecycle,
    }
  }

  /// Records a draft decision and notifies the senior editors.
  pub fn draft(
    &self,
    article_id: ArticleId,
    section_editor: UserId,
    decision: Decision,
    rationale: impl Into<String>,
    ctx: &NotificationContext,
  ) -> QuireResult<DraftId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = DraftId(self.store.allocate_id());
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.is_editor(section_editor, journal) {
        return Err(QuireError::NotAnEditor {
          user: section_editor,
          journal,
        });
      }
      if !article.stage.decision_open() {
        return Err(QuireError::precondition(
          "draft_decision",
          article_id,
          "a stage where decisions are open",
          article.stage,
        ));
      }
      article.decision_drafts.push(DecisionDraft {
        id,
        section_editor,
        decision,
        rationale: rationale.into(),
        drafted: Utc::now(),
        closed: false,
        editor_decision: None,
      });
      events.push(Event::DraftDecision(DraftPayload {
        article: article_id,
        draft: id,
        section_editor,
        decision,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  /// Approves a draft and actions its decision exactly once.
  ///
  /// The claim happens first, under the article lock; the decision is then
  /// actioned with the lock released. If actioning fails (say, the stage
  /// moved underneath us) the claim is rolled back so the draft is not
  /// silently lost.
  #[instrument(skip(self, ctx), fields(article = %article_id, draft = %draft_id), err(Display))]
  pub fn approve(
    &self,
    article_id: ArticleId,
    draft_id: DraftId,
    editor: UserId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let decision;
    let rationale;
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.is_editor(editor, journal) {
        return Err(QuireError::NotAnEditor {
          user: editor,
          journal,
        });
      }
      let draft = article
        .decision_drafts
        .iter_mut()
        .find(|d| d.id == draft_id)
        .ok_or_else(|| QuireError::not_found("decision draft", draft_id))?;
      if draft.closed {
        return Err(QuireError::AlreadyActioned {
          article: article_id,
          draft: draft_id,
        });
      }
      draft.closed = true;
      draft.editor_decision = Some(DraftVerdict::Accepted);
      decision = draft.decision;
      rationale = draft.rationale.clone();
    }

    let outcome = match decision {
      Decision::Accept => self.lifecycle.accept(article_id, ctx, None, false),
      Decision::Decline => self.lifecycle.decline(article_id, ctx, None, false),
      Decision::MinorRevisions => self
        .lifecycle
        .request_revisions(article_id, editor, RevisionType::MinorRevisions, rationale, None, ctx)
        .map(|_| ()),
      Decision::MajorRevisions => self
        .lifecycle
        .request_revisions(article_id, editor, RevisionType::MajorRevisions, rationale, None, ctx)
        .map(|_| ()),
    };

    if let Err(err) = outcome {
      let mut article = handle.lock();
      if let Some(draft) = article.decision_drafts.iter_mut().find(|d| d.id == draft_id) {
        draft.closed = false;
        draft.editor_decision = None;
      }
      event!(
        Level::WARN,
        article = %article_id,
        draft = %draft_id,
        error = %err,
        "Draft decision could not be actioned; claim rolled back."
      );
      return Err(err);
    }
    Ok(())
  }

  /// Declines a draft: it closes without actioning anything.
  pub fn decline_draft(&self, article_id: ArticleId, draft_id: DraftId, editor: UserId) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let journal = article.journal;
    if !self.roles.is_editor(editor, journal) {
      return Err(QuireError::NotAnEditor {
        user: editor,
        journal,
      });
    }
    let draft = article
      .decision_drafts
      .iter_mut()
      .find(|d| d.id == draft_id)
      .ok_or_else(|| QuireError::not_found("decision draft", draft_id))?;
    if draft.closed {
      return Err(QuireError::AlreadyActioned {
        article: article_id,
        draft: draft_id,
      });
    }
    draft.closed = true;
    draft.editor_decision = Some(DraftVerdict::Declined);
    event!(
      Level::INFO,
      article = %article_id,
      draft = %draft_id,
      %editor,
      "Draft decision declined by senior editor."
    );
    Ok(())
  }
}
