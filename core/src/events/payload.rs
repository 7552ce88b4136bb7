// quire/src/events/payload.rs

//! Event definitions. Every lifecycle event is a variant of [`Event`]
//! carrying a typed payload; [`EventKind`] is the fieldless mirror used as
//! the registration key. Kind names double as the stable wire names for
//! logs and external integrations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{Decision, DraftId};
use crate::identity::UserId;
use crate::journal::JournalId;
use crate::production::{TaskDecision, TypesetTaskId};
use crate::proofing::{CorrectionTaskId, ProofingTaskId};
use crate::review::{Recommendation, ReviewAssignmentId};
use crate::revision::{RevisionId, RevisionType};
use crate::submission::{ArticleId, EditorType, Identifier, Stage};
use crate::workflow::WorkflowElement;

/// Where a notification-driving operation happened and who drove it.
/// Handlers that send mail or build links read everything they need from
/// here instead of reaching back into request state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationContext {
  pub journal: JournalId,
  pub actor: Option<UserId>,
  pub base_url: Option<String>,
}

impl NotificationContext {
  pub fn new(journal: JournalId, actor: Option<UserId>) -> Self {
    Self {
      journal,
      actor,
      base_url: None,
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = Some(base_url.into());
    self
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlePayload {
  pub article: ArticleId,
  pub ctx: NotificationContext,
  /// Free-text addition to whatever notification a handler sends.
  pub message: Option<String>,
  /// True when the actor asked to suppress notifications.
  pub skip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorAssignedPayload {
  pub article: ArticleId,
  pub editor: UserId,
  pub editor_type: EditorType,
  pub ctx: NotificationContext,
  pub skip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerPayload {
  pub article: ArticleId,
  pub manager: UserId,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPayload {
  pub article: ArticleId,
  pub assignment: ReviewAssignmentId,
  pub round: u32,
  pub reviewer: UserId,
  /// Set on completion and withdrawal; `None` for request/response events.
  pub decision: Option<Recommendation>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPayload {
  pub article: ArticleId,
  pub decision: Decision,
  pub ctx: NotificationContext,
  pub message: Option<String>,
  pub skip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPayload {
  pub article: ArticleId,
  pub draft: DraftId,
  pub section_editor: UserId,
  pub decision: Decision,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionPayload {
  pub article: ArticleId,
  pub revision: RevisionId,
  pub revision_type: RevisionType,
  pub date_due: DateTime<Utc>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypesetPayload {
  pub article: ArticleId,
  pub task: TypesetTaskId,
  pub typesetter: UserId,
  pub decision: Option<TaskDecision>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofingPayload {
  pub article: ArticleId,
  pub task: ProofingTaskId,
  pub proofreader: UserId,
  pub decision: Option<TaskDecision>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionPayload {
  pub article: ArticleId,
  pub correction: CorrectionTaskId,
  pub typesetter: UserId,
  pub decision: Option<TaskDecision>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationPayload {
  pub article: ArticleId,
  /// Identifiers (DOIs etc.) for an external registrar handler to act on.
  pub identifiers: Vec<Identifier>,
  pub ctx: NotificationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPayload {
  pub article: ArticleId,
  pub element: WorkflowElement,
  /// Link back into the component that finished, for notifications.
  pub handshake_url: String,
  /// When false the registry records completion but leaves the stage alone.
  pub switch_stage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageChangePayload {
  pub article: ArticleId,
  pub from: Stage,
  pub to: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
  ArticleSubmitted(ArticlePayload),
  ArticleAssigned(EditorAssignedPayload),
  ReviewerRequested(ReviewPayload),
  ReviewerAccepted(ReviewPayload),
  ReviewerDeclined(ReviewPayload),
  ReviewComplete(ReviewPayload),
  ReviewClosed(ReviewPayload),
  ReviewWithdrawn(ReviewPayload),
  ArticleAccepted(DecisionPayload),
  ArticleDeclined(DecisionPayload),
  DraftDecision(DraftPayload),
  RevisionsRequested(RevisionPayload),
  RevisionsComplete(RevisionPayload),
  TypesetTaskAssigned(TypesetPayload),
  TypesetterDecision(TypesetPayload),
  TypesetTaskDeleted(TypesetPayload),
  TypesetComplete(TypesetPayload),
  ProductionComplete(ArticlePayload),
  ProofingManagerAssigned(ManagerPayload),
  ProofingTaskAssigned(ProofingPayload),
  ProofreaderDecision(ProofingPayload),
  ProofingTaskComplete(ProofingPayload),
  ProofingTaskCancelled(ProofingPayload),
  CorrectionsRequested(CorrectionPayload),
  CorrectionDecision(CorrectionPayload),
  CorrectionsComplete(CorrectionPayload),
  ProofingComplete(ArticlePayload),
  ArticlePublished(PublicationPayload),
  PreprintSubmitted(ArticlePayload),
  PreprintPublished(ArticlePayload),
  WorkflowElementComplete(WorkflowPayload),
  /// Reserved event raised on every stage transition so components can
  /// tear down tasks that no longer apply.
  DestroyTasks(StageChangePayload),
}

impl Event {
  pub fn kind(&self) -> EventKind {
    match self {
      Event::ArticleSubmitted(_) => EventKind::ArticleSubmitted,
      Event::ArticleAssigned(_) => EventKind::ArticleAssigned,
      Event::ReviewerRequested(_) => EventKind::ReviewerRequested,
      Event::ReviewerAccepted(_) => EventKind::ReviewerAccepted,
      Event::ReviewerDeclined(_) => EventKind::ReviewerDeclined,
      Event::ReviewComplete(_) => EventKind::ReviewComplete,
      Event::ReviewClosed(_) => EventKind::ReviewClosed,
      Event::ReviewWithdrawn(_) => EventKind::ReviewWithdrawn,
      Event::ArticleAccepted(_) => EventKind::ArticleAccepted,
      Event::ArticleDeclined(_) => EventKind::ArticleDeclined,
      Event::DraftDecision(_) => EventKind::DraftDecision,
      Event::RevisionsRequested(_) => EventKind::RevisionsRequested,
      Event::RevisionsComplete(_) => EventKind::RevisionsComplete,
      Event::TypesetTaskAssigned(_) => EventKind::TypesetTaskAssigned,
      Event::TypesetterDecision(_) => EventKind::TypesetterDecision,
      Event::TypesetTaskDeleted(_) => EventKind::TypesetTaskDeleted,
      Event::TypesetComplete(_) => EventKind::TypesetComplete,
      Event::ProductionComplete(_) => EventKind::ProductionComplete,
      Event::ProofingManagerAssigned(_) => EventKind::ProofingManagerAssigned,
      Event::ProofingTaskAssigned(_) => EventKind::ProofingTaskAssigned,
      Event::ProofreaderDecision(_) => EventKind::ProofreaderDecision,
      Event::ProofingTaskComplete(_) => EventKind::ProofingTaskComplete,
      Event::ProofingTaskCancelled(_) => EventKind::ProofingTaskCancelled,
      Event::CorrectionsRequested(_) => EventKind::CorrectionsRequested,
      Event::CorrectionDecision(_) => EventKind::CorrectionDecision,
      Event::CorrectionsComplete(_) => EventKind::CorrectionsComplete,
      Event::ProofingComplete(_) => EventKind::ProofingComplete,
      Event::ArticlePublished(_) => EventKind::ArticlePublished,
      Event::PreprintSubmitted(_) => EventKind::PreprintSubmitted,
      Event::PreprintPublished(_) => EventKind::PreprintPublished,
      Event::WorkflowElementComplete(_) => EventKind::WorkflowElementComplete,
      Event::DestroyTasks(_) => EventKind::DestroyTasks,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  ArticleSubmitted,
  ArticleAssigned,
  ReviewerRequested,
  ReviewerAccepted,
  ReviewerDeclined,
  ReviewComplete,
  ReviewClosed,
  ReviewWithdrawn,
  ArticleAccepted,
  ArticleDeclined,
  DraftDecision,
  RevisionsRequested,
  RevisionsComplete,
  TypesetTaskAssigned,
  TypesetterDecision,
  TypesetTaskDeleted,
  TypesetComplete,
  ProductionComplete,
  ProofingManagerAssigned,
  ProofingTaskAssigned,
  ProofreaderDecision,
  ProofingTaskComplete,
  ProofingTaskCancelled,
  CorrectionsRequested,
  CorrectionDecision,
  CorrectionsComplete,
  ProofingComplete,
  ArticlePublished,
  PreprintSubmitted,
  PreprintPublished,
  WorkflowElementComplete,
  DestroyTasks,
}

impl EventKind {
  pub const ALL: &'static [EventKind] = &[
    EventKind::ArticleSubmitted,
    EventKind::ArticleAssigned,
    EventKind::ReviewerRequested,
    EventKind::ReviewerAccepted,
    EventKind::ReviewerDeclined,
    EventKind::ReviewComplete,
    EventKind::ReviewClosed,
    EventKind::ReviewWithdrawn,
    EventKind::ArticleAccepted,
    EventKind::ArticleDeclined,
    EventKind::DraftDecision,
    EventKind::RevisionsRequested,
    EventKind::RevisionsComplete,
    EventKind::TypesetTaskAssigned,
    EventKind::TypesetterDecision,
    EventKind::TypesetTaskDeleted,
    EventKind::TypesetComplete,
    EventKind::ProductionComplete,
    EventKind::ProofingManagerAssigned,
    EventKind::ProofingTaskAssigned,
    EventKind::ProofreaderDecision,
    EventKind::ProofingTaskComplete,
    EventKind::ProofingTaskCancelled,
    EventKind::CorrectionsRequested,
    EventKind::CorrectionDecision,
    EventKind::CorrectionsComplete,
    EventKind::ProofingComplete,
    EventKind::ArticlePublished,
    EventKind::PreprintSubmitted,
    EventKind::PreprintPublished,
    EventKind::WorkflowElementComplete,
    EventKind::DestroyTasks,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      EventKind::ArticleSubmitted => "on_article_submitted",
      EventKind::ArticleAssigned => "on_article_assigned",
      EventKind::ReviewerRequested => "on_reviewer_requested",
      EventKind::ReviewerAccepted => "on_reviewer_accepted",
      EventKind::ReviewerDeclined => "on_reviewer_declined",
      EventKind::ReviewComplete => "on_review_complete",
      EventKind::ReviewClosed => "on_review_closed",
      EventKind::ReviewWithdrawn => "on_review_withdrawn",
      EventKind::ArticleAccepted => "on_article_accepted",
      EventKind::ArticleDeclined => "on_article_declined",
      EventKind::DraftDecision => "on_draft_decision",
      EventKind::RevisionsRequested => "on_revisions_requested",
      EventKind::RevisionsComplete => "on_revisions_complete",
      EventKind::TypesetTaskAssigned => "on_typeset_task_assigned",
      EventKind::TypesetterDecision => "on_typesetter_decision",
      EventKind::TypesetTaskDeleted => "on_typeset_task_deleted",
      EventKind::TypesetComplete => "on_typeset_complete",
      EventKind::ProductionComplete => "on_production_complete",
      EventKind::ProofingManagerAssigned => "on_proofing_manager_assignment",
      EventKind::ProofingTaskAssigned => "on_proofing_task_assigned",
      EventKind::ProofreaderDecision => "on_proofreader_decision",
      EventKind::ProofingTaskComplete => "on_proofing_task_complete",
      EventKind::ProofingTaskCancelled => "on_proofing_task_cancelled",
      EventKind::CorrectionsRequested => "on_corrections_requested",
      EventKind::CorrectionDecision => "on_correction_decision",
      EventKind::CorrectionsComplete => "on_corrections_complete",
      EventKind::ProofingComplete => "on_proofing_complete",
      EventKind::ArticlePublished => "on_article_published",
      EventKind::PreprintSubmitted => "on_preprint_submission",
      EventKind::PreprintPublished => "on_preprint_publication",
      EventKind::WorkflowElementComplete => "on_workflow_element_complete",
      EventKind::DestroyTasks => "destroy_tasks",
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
