// quire/src/lifecycle.rs

//! The article state machine. Operations validate the current stage,
//! mutate under the article lock, and raise their events only after the
//! lock is released, so a failing handler can never leave an article
//! half-transitioned.

use std::sync::Arc;

use chrono::Utc;
use tracing::{event, instrument, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::{
  ArticlePayload, DecisionPayload, EditorAssignedPayload, Event, EventBus, NotificationContext,
  PublicationPayload, RevisionPayload, WorkflowPayload,
};
use crate::identity::{Role, RoleDirectory, UserId};
use crate::decision::Decision;
use crate::review::ReviewRound;
use crate::revision::{RevisionId, RevisionRequest, RevisionType};
use crate::store::ArticleStore;
use crate::submission::{ArticleId, EditorAssignment, EditorType, Stage};
use crate::workflow::{WorkflowElement, WorkflowRegistry};

#[derive(Clone)]
pub struct ArticleLifecycle {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  registry: Arc<WorkflowRegistry>,
  roles: Arc<dyn RoleDirectory>,
}

impl ArticleLifecycle {
  pub fn new(
    store: Arc<ArticleStore>,
    bus: Arc<EventBus>,
    registry: Arc<WorkflowRegistry>,
    roles: Arc<dyn RoleDirectory>,
  ) -> Self {
    Self {
      store,
      bus,
      registry,
      roles,
    }
  }

  /// Submits the article into the editorial pipeline. Requires at least
  /// one manuscript file.
  #[instrument(skip(self, ctx), fields(article = %article_id), err(Display))]
  pub fn submit(&self, article_id: ArticleId, ctx: &NotificationContext) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if article.is_preprint {
        return Err(QuireError::precondition(
          "submit",
          article_id,
          "a regular article",
          "article is a preprint",
        ));
      }
      if article.stage != Stage::Unsubmitted {
        return Err(QuireError::precondition(
          "submit",
          article_id,
          Stage::Unsubmitted.name(),
          article.stage,
        ));
      }
      if article.manuscript_files.is_empty() {
        return Err(QuireError::precondition(
          "submit",
          article_id,
          "at least one manuscript file",
          "no manuscript files",
        ));
      }
      article.date_submitted = Some(Utc::now());
      article.set_stage(Stage::Unassigned, &mut events);
      events.push(Event::ArticleSubmitted(ArticlePayload {
        article: article_id,
        ctx: ctx.clone(),
        message: None,
        skip: false,
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Puts an editor (or section editor) on the article. Duplicate
  /// assignment of the same person is rejected.
  pub fn assign_editor(
    &self,
    article_id: ArticleId,
    editor: UserId,
    editor_type: EditorType,
    ctx: &NotificationContext,
    skip: bool,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let journal = article.journal;
      let required = match editor_type {
        EditorType::Editor => Role::Editor,
        EditorType::SectionEditor => Role::SectionEditor,
      };
      if !self.roles.has_role(editor, required, journal) {
        return Err(QuireError::NotAnEditor {
          user: editor,
          journal,
        });
      }
      if article.has_editor(editor) {
        return Err(QuireError::DuplicateAssignment {
          article: article_id,
          user: editor,
        });
      }
      article.editor_assignments.push(EditorAssignment {
        editor,
        editor_type,
        assigned: Utc::now(),
        notified: !skip,
      });
      events.push(Event::ArticleAssigned(EditorAssignedPayload {
        article: article_id,
        editor,
        editor_type,
        ctx: ctx.clone(),
        skip,
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn unassign_editor(&self, article_id: ArticleId, editor: UserId) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let index = article
      .editor_assignments
      .iter()
      .position(|a| a.editor == editor)
      .ok_or_else(|| QuireError::not_found("editor assignment", editor))?;
    article.editor_assignments.remove(index);
    event!(Level::INFO, article = %article_id, %editor, "Editor unassigned.");
    Ok(())
  }

  /// Moves the article into the review element. Requires at least one
  /// editor assignment; creates round one iff no round exists yet, and
  /// warns instead of touching rounds that are already there.
  #[instrument(skip(self, _ctx), fields(article = %article_id), err(Display))]
  pub fn move_to_review(&self, article_id: ArticleId, _ctx: &NotificationContext) -> QuireResult<u32> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let round_number;
    {
      let mut article = handle.lock();
      if article.editor_assignments.is_empty() {
        return Err(QuireError::precondition(
          "move_to_review",
          article_id,
          "at least one editor assignment",
          "no editor assignments",
        ));
      }
      match article.stage {
        Stage::Unassigned | Stage::Assigned => article.set_stage(Stage::Assigned, &mut events),
        // Reviews are already running; leave the stage alone.
        Stage::UnderReview => {
          event!(
            Level::WARN,
            article = %article_id,
            "Article is already under review; move_to_review is a no-op."
          );
        }
        other => {
          return Err(QuireError::precondition(
            "move_to_review",
            article_id,
            "Unassigned, Assigned or Under Review",
            other,
          ));
        }
      }
      if article.review_rounds.is_empty() {
        article.review_rounds.push(ReviewRound::new(1));
      } else {
        event!(
          Level::WARN,
          article = %article_id,
          "Article already has review rounds; leaving them untouched."
        );
      }
      round_number = article.review_rounds.last().map(|r| r.number).unwrap_or(1);
    }
    self.bus.raise_all(&events)?;
    Ok(round_number)
  }

  /// Accepts the article. The acceptance date is set once, the author
  /// list is snapshotted, and the workflow registry advances the stage to
  /// whatever follows the review element for this journal.
  #[instrument(skip(self, ctx, message), fields(article = %article_id), err(Display))]
  pub fn accept(
    &self,
    article_id: ArticleId,
    ctx: &NotificationContext,
    message: Option<String>,
    skip: bool,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if !article.stage.decision_open() {
        return Err(QuireError::precondition(
          "accept",
          article_id,
          "a stage where decisions are open",
          article.stage,
        ));
      }
      if article.date_accepted.is_none() {
        article.date_accepted = Some(Utc::now());
      }
      article.date_declined = None;
      article.snapshot_authors();
      article.set_stage(Stage::Accepted, &mut events);
      events.push(Event::ArticleAccepted(DecisionPayload {
        article: article_id,
        decision: Decision::Accept,
        ctx: ctx.clone(),
        message,
        skip,
      }));
      events.push(Event::WorkflowElementComplete(WorkflowPayload {
        article: article_id,
        element: WorkflowElement::Review,
        handshake_url: ctx.base_url.clone().unwrap_or_default(),
        switch_stage: true,
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Declines the article; the workflow ends here.
  #[instrument(skip(self, ctx, message), fields(article = %article_id), err(Display))]
  pub fn decline(
    &self,
    article_id: ArticleId,
    ctx: &NotificationContext,
    message: Option<String>,
    skip: bool,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if !article.stage.decision_open() {
        return Err(QuireError::precondition(
          "decline",
          article_id,
          "a stage where decisions are open",
          article.stage,
        ));
      }
      article.date_declined = Some(Utc::now());
      article.date_accepted = None;
      article.set_stage(Stage::Rejected, &mut events);
      events.push(Event::ArticleDeclined(DecisionPayload {
        article: article_id,
        decision: Decision::Decline,
        ctx: ctx.clone(),
        message,
        skip,
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Asks the author for minor or major revisions; the article moves to
  /// Under Revision until the request completes.
  pub fn request_revisions(
    &self,
    article_id: ArticleId,
    editor: UserId,
    revision_type: RevisionType,
    editor_note: impl Into<String>,
    date_due: Option<chrono::DateTime<Utc>>,
    ctx: &NotificationContext,
  ) -> QuireResult<RevisionId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = RevisionId(self.store.allocate_id());
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.is_editor(editor, journal) {
        return Err(QuireError::NotAnEditor {
          user: editor,
          journal,
        });
      }
      if !article.stage.decision_open() {
        return Err(QuireError::precondition(
          "request_revisions",
          article_id,
          "a stage where decisions are open",
          article.stage,
        ));
      }
      let request = RevisionRequest::new(id, editor, revision_type, editor_note.into(), date_due);
      let due = request.date_due;
      article.revision_requests.push(request);
      article.set_stage(Stage::UnderRevision, &mut events);
      events.push(Event::RevisionsRequested(RevisionPayload {
        article: article_id,
        revision: id,
        revision_type,
        date_due: due,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  /// Publishes an article that has cleared prepublication. The
  /// publication date is set exactly once; identifiers ride on the event
  /// for an external registrar.
  #[instrument(skip(self, ctx), fields(article = %article_id), err(Display))]
  pub fn publish(&self, article_id: ArticleId, ctx: &NotificationContext) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if article.stage != Stage::ReadyForPublication {
        return Err(QuireError::precondition(
          "publish",
          article_id,
          Stage::ReadyForPublication.name(),
          article.stage,
        ));
      }
      article.snapshot_authors();
      if article.date_published.is_none() {
        article.date_published = Some(Utc::now());
      } else {
        event!(
          Level::WARN,
          article = %article_id,
          "Article already carries a publication date; keeping it."
        );
      }
      article.set_stage(Stage::Published, &mut events);
      events.push(Event::ArticlePublished(PublicationPayload {
        article: article_id,
        identifiers: article.identifiers.clone(),
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Generic "this element is done" hand-off for elements without a
  /// dedicated manager (copyediting, prepublication checklists). The
  /// workflow registry picks the next stage.
  pub fn complete_workflow_element(
    &self,
    article_id: ArticleId,
    element: WorkflowElement,
    handshake_url: impl Into<String>,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let journal = handle.lock().journal;
    if !self.registry.contains(journal, element) {
      return Err(QuireError::precondition(
        "complete_workflow_element",
        article_id,
        format!("element '{element}' enabled for journal {journal}"),
        "element not in journal workflow",
      ));
    }
    self.bus.raise(&Event::WorkflowElementComplete(WorkflowPayload {
      article: article_id,
      element,
      handshake_url: handshake_url.into(),
      switch_stage: true,
    }))
  }

  /// Submits a preprint into the lightweight preprint pipeline.
  pub fn submit_preprint(&self, article_id: ArticleId, ctx: &NotificationContext) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if !article.is_preprint {
        return Err(QuireError::precondition(
          "submit_preprint",
          article_id,
          "a preprint",
          "article is not a preprint",
        ));
      }
      if article.stage != Stage::Unsubmitted {
        return Err(QuireError::precondition(
          "submit_preprint",
          article_id,
          Stage::Unsubmitted.name(),
          article.stage,
        ));
      }
      if article.manuscript_files.is_empty() {
        return Err(QuireError::precondition(
          "submit_preprint",
          article_id,
          "at least one manuscript file",
          "no manuscript files",
        ));
      }
      article.date_submitted = Some(Utc::now());
      article.set_stage(Stage::PreprintReview, &mut events);
      events.push(Event::PreprintSubmitted(ArticlePayload {
        article: article_id,
        ctx: ctx.clone(),
        message: None,
        skip: false,
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Publishes a moderated preprint.
  pub fn publish_preprint(&self, article_id: ArticleId, ctx: &NotificationContext) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if article.stage != Stage::PreprintReview {
        return Err(QuireError::precondition(
          "publish_preprint",
          article_id,
          Stage::PreprintReview.name(),
          article.stage,
        ));
      }
      if article.date_published.is_none() {
        article.date_published = Some(Utc::now());
      }
      article.snapshot_authors();
      article.set_stage(Stage::PreprintPublished, &mut events);
      events.push(Event::PreprintPublished(ArticlePayload {
        article: article_id,
        ctx: ctx.clone(),
        message: None,
        skip: false,
      }));
    }
    self.bus.raise_all(&events)
  }
}
