// quire/src/submission.rs

//! The article aggregate: stage enumeration, authorship, identifiers and
//! editor assignments. Review rounds, revision requests, decision drafts
//! and the production/proofing chains hang off the article so that one
//! lock covers every mutation of its editorial state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::decision::DecisionDraft;
use crate::events::{Event, StageChangePayload};
use crate::identity::UserId;
use crate::journal::JournalId;
use crate::files::FileRef;
use crate::production::ProductionAssignment;
use crate::proofing::ProofingAssignment;
use crate::review::{ReviewAssignment, ReviewAssignmentId, ReviewRound};
use crate::revision::RevisionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleId(pub u64);

impl fmt::Display for ArticleId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Every stage an article can occupy, across the regular and preprint
/// pipelines. Stage names follow the upstream editorial vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Unsubmitted,
  Unassigned,
  Assigned,
  UnderReview,
  UnderRevision,
  Accepted,
  Rejected,
  EditorCopyediting,
  AuthorCopyediting,
  FinalCopyediting,
  Typesetting,
  Proofing,
  ReadyForPublication,
  Published,
  PreprintReview,
  PreprintPublished,
}

impl Stage {
  pub fn name(&self) -> &'static str {
    match self {
      Stage::Unsubmitted => "Unsubmitted",
      Stage::Unassigned => "Unassigned",
      Stage::Assigned => "Assigned",
      Stage::UnderReview => "Under Review",
      Stage::UnderRevision => "Under Revision",
      Stage::Accepted => "Accepted",
      Stage::Rejected => "Rejected",
      Stage::EditorCopyediting => "Editor Copyediting",
      Stage::AuthorCopyediting => "Author Copyediting",
      Stage::FinalCopyediting => "Final Copyediting",
      Stage::Typesetting => "Typesetting",
      Stage::Proofing => "Proofing",
      Stage::ReadyForPublication => "pre_publication",
      Stage::Published => "Published",
      Stage::PreprintReview => "preprint_review",
      Stage::PreprintPublished => "preprint_published",
    }
  }

  /// Stages in which an editorial decision (accept, decline, revisions)
  /// may still be taken.
  pub fn decision_open(&self) -> bool {
    matches!(
      self,
      Stage::Unassigned | Stage::Assigned | Stage::UnderReview | Stage::UnderRevision
    )
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
  pub user: UserId,
  pub first_name: String,
  pub last_name: String,
  pub institution: String,
}

/// Authorship record captured at acceptance/publication time, decoupled
/// from later account edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenAuthor {
  pub author: UserId,
  pub first_name: String,
  pub last_name: String,
  pub institution: String,
  pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
  Doi,
  Uri,
  PubId,
}

impl IdentifierKind {
  pub fn slug(&self) -> &'static str {
    match self {
      IdentifierKind::Doi => "doi",
      IdentifierKind::Uri => "uri",
      IdentifierKind::PubId => "pubid",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
  pub kind: IdentifierKind,
  pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorType {
  Editor,
  SectionEditor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorAssignment {
  pub editor: UserId,
  pub editor_type: EditorType,
  pub assigned: DateTime<Utc>,
  pub notified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
  pub id: ArticleId,
  pub journal: JournalId,
  pub owner: UserId,
  pub title: String,
  pub is_preprint: bool,
  pub stage: Stage,
  /// Submission wizard progress; meaningful only before submission.
  pub current_step: u32,
  pub date_submitted: Option<DateTime<Utc>>,
  pub date_accepted: Option<DateTime<Utc>>,
  pub date_declined: Option<DateTime<Utc>>,
  pub date_published: Option<DateTime<Utc>>,
  pub authors: Vec<Author>,
  pub frozen_authors: Vec<FrozenAuthor>,
  pub manuscript_files: Vec<FileRef>,
  pub data_figure_files: Vec<FileRef>,
  pub identifiers: Vec<Identifier>,
  pub editor_assignments: Vec<EditorAssignment>,
  pub review_rounds: Vec<ReviewRound>,
  pub revision_requests: Vec<RevisionRequest>,
  pub decision_drafts: Vec<DecisionDraft>,
  pub production: Option<ProductionAssignment>,
  pub proofing: Option<ProofingAssignment>,
}

impl Article {
  pub(crate) fn new(id: ArticleId, journal: JournalId, owner: UserId, title: &str) -> Self {
    Self {
      id,
      journal,
      owner,
      title: title.to_string(),
      is_preprint: false,
      stage: Stage::Unsubmitted,
      current_step: 1,
      date_submitted: None,
      date_accepted: None,
      date_declined: None,
      date_published: None,
      authors: Vec::new(),
      frozen_authors: Vec::new(),
      manuscript_files: Vec::new(),
      data_figure_files: Vec::new(),
      identifiers: Vec::new(),
      editor_assignments: Vec::new(),
      review_rounds: Vec::new(),
      revision_requests: Vec::new(),
      decision_drafts: Vec::new(),
      production: None,
      proofing: None,
    }
  }

  pub(crate) fn preprint(id: ArticleId, journal: JournalId, owner: UserId, title: &str) -> Self {
    let mut article = Self::new(id, journal, owner, title);
    article.is_preprint = true;
    article
  }

  /// Moves the article to `new`, appending the reserved stage-change event.
  /// A no-op when the stage is unchanged.
  pub(crate) fn set_stage(&mut self, new: Stage, events: &mut Vec<Event>) {
    if self.stage == new {
      return;
    }
    let old = self.stage;
    self.stage = new;
    event!(
      Level::INFO,
      article = %self.id,
      from = %old,
      to = %new,
      "Stage transition."
    );
    events.push(Event::DestroyTasks(StageChangePayload {
      article: self.id,
      from: old,
      to: new,
    }));
  }

  /// Captures the author list as frozen records. Idempotent: an existing
  /// snapshot is never overwritten.
  pub fn snapshot_authors(&mut self) {
    if !self.frozen_authors.is_empty() {
      return;
    }
    self.frozen_authors = self
      .authors
      .iter()
      .enumerate()
      .map(|(order, author)| FrozenAuthor {
        author: author.user,
        first_name: author.first_name.clone(),
        last_name: author.last_name.clone(),
        institution: author.institution.clone(),
        order: order as u32,
      })
      .collect();
  }

  pub fn has_editor(&self, editor: UserId) -> bool {
    self.editor_assignments.iter().any(|a| a.editor == editor)
  }

  /// Highest-numbered round; rounds are appended in order.
  pub fn current_review_round(&self) -> Option<&ReviewRound> {
    self.review_rounds.last()
  }

  pub(crate) fn current_review_round_mut(&mut self) -> Option<&mut ReviewRound> {
    self.review_rounds.last_mut()
  }

  pub fn review_assignment(&self, id: ReviewAssignmentId) -> Option<&ReviewAssignment> {
    self
      .review_rounds
      .iter()
      .flat_map(|round| round.assignments.iter())
      .find(|a| a.id == id)
  }

  pub(crate) fn review_assignment_mut(&mut self, id: ReviewAssignmentId) -> Option<&mut ReviewAssignment> {
    self
      .review_rounds
      .iter_mut()
      .flat_map(|round| round.assignments.iter_mut())
      .find(|a| a.id == id)
  }

  /// True while any revision request is still outstanding.
  pub fn is_under_revision(&self) -> bool {
    self.revision_requests.iter().any(|r| r.date_completed.is_none())
  }
}
