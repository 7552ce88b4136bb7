// quire/src/review.rs

//! Peer review rounds and assignments.
//!
//! A round groups the assignments opened against one version of the
//! manuscript; opening a new round force-withdraws whatever is still open
//! in the old one. Reviewers reach their assignment either as a logged-in
//! account or through the access code minted at assignment time; both
//! paths resolve the same record and carry identical authority.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::error::{QuireError, QuireResult};
use crate::events::{Event, EventBus, NotificationContext, ReviewPayload};
use crate::files::FileRef;
use crate::identity::{Role, RoleDirectory, UserId};
use crate::store::ArticleStore;
use crate::submission::{ArticleId, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReviewAssignmentId(pub u64);

impl fmt::Display for ReviewAssignmentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A reviewer's verdict on the manuscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
  Accept,
  MinorRevisions,
  MajorRevisions,
  Reject,
  /// Recorded when an editor withdraws the assignment or a new round
  /// closes it; never chosen by the reviewer.
  Withdrawn,
}

impl Recommendation {
  pub fn slug(&self) -> &'static str {
    match self {
      Recommendation::Accept => "accept",
      Recommendation::MinorRevisions => "minor_revisions",
      Recommendation::MajorRevisions => "major_revisions",
      Recommendation::Reject => "reject",
      Recommendation::Withdrawn => "withdrawn",
    }
  }
}

impl fmt::Display for Recommendation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewVisibility {
  Open,
  Blind,
  DoubleBlind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
  Requested,
  Accepted,
  Declined,
  Complete,
  Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAnswer {
  pub element: String,
  pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAssignment {
  pub id: ReviewAssignmentId,
  pub round: u32,
  pub reviewer: UserId,
  pub editor: UserId,
  /// Minted at assignment time; lets the reviewer act without an account.
  pub access_code: Uuid,
  pub visibility: ReviewVisibility,
  pub date_requested: DateTime<Utc>,
  pub date_due: DateTime<Utc>,
  pub date_accepted: Option<DateTime<Utc>>,
  pub date_declined: Option<DateTime<Utc>>,
  pub date_complete: Option<DateTime<Utc>>,
  pub is_complete: bool,
  pub decision: Option<Recommendation>,
  pub for_author_consumption: bool,
  pub review_file: Option<FileRef>,
  pub answers: Vec<ReviewAnswer>,
}

impl ReviewAssignment {
  fn new(
    id: ReviewAssignmentId,
    round: u32,
    reviewer: UserId,
    editor: UserId,
    date_due: DateTime<Utc>,
    visibility: ReviewVisibility,
  ) -> Self {
    Self {
      id,
      round,
      reviewer,
      editor,
      access_code: Uuid::new_v4(),
      visibility,
      date_requested: Utc::now(),
      date_due,
      date_accepted: None,
      date_declined: None,
      date_complete: None,
      is_complete: false,
      decision: None,
      for_author_consumption: false,
      review_file: None,
      answers: Vec::new(),
    }
  }

  pub fn status(&self) -> ReviewStatus {
    if self.decision == Some(Recommendation::Withdrawn) {
      ReviewStatus::Withdrawn
    } else if self.is_complete {
      if self.date_declined.is_some() {
        ReviewStatus::Declined
      } else {
        ReviewStatus::Complete
      }
    } else if self.date_accepted.is_some() {
      ReviewStatus::Accepted
    } else {
      ReviewStatus::Requested
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRound {
  pub number: u32,
  pub date_started: DateTime<Utc>,
  /// Files shared with reviewers for this round. An assignment cannot be
  /// created while this is empty.
  pub review_files: Vec<FileRef>,
  pub assignments: Vec<ReviewAssignment>,
}

impl ReviewRound {
  pub(crate) fn new(number: u32) -> Self {
    Self {
      number,
      date_started: Utc::now(),
      review_files: Vec::new(),
      assignments: Vec::new(),
    }
  }

  pub fn has_open_assignments(&self) -> bool {
    self.assignments.iter().any(|a| !a.is_complete)
  }
}

/// How a reviewer identifies themselves to a mutating operation.
/// Both paths must resolve the same assignment with the same authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerKey {
  Reviewer(UserId),
  AccessCode(Uuid),
}

impl ReviewerKey {
  fn matches(&self, assignment: &ReviewAssignment) -> bool {
    match self {
      ReviewerKey::Reviewer(user) => assignment.reviewer == *user,
      ReviewerKey::AccessCode(code) => assignment.access_code == *code,
    }
  }
}

/// Seam to the form component that owns review form definitions.
pub trait FormValidator: Send + Sync {
  /// True when every required element of the review form is answered.
  fn required_answered(&self, answers: &[ReviewAnswer]) -> bool;
}

/// Default policy: a completed review must carry at least one answer.
pub struct AnswersRequired;

impl FormValidator for AnswersRequired {
  fn required_answered(&self, answers: &[ReviewAnswer]) -> bool {
    !answers.is_empty()
  }
}

pub struct ReviewManager {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  roles: Arc<dyn RoleDirectory>,
  forms: Arc<dyn FormValidator>,
}

impl ReviewManager {
  pub fn new(
    store: Arc<ArticleStore>,
    bus: Arc<EventBus>,
    roles: Arc<dyn RoleDirectory>,
    forms: Arc<dyn FormValidator>,
  ) -> Self {
    Self {
      store,
      bus,
      roles,
      forms,
    }
  }

  /// Repairs the "an article in review has a round" invariant: creates
  /// round one iff no round exists, and returns the current round number.
  pub fn ensure_current_round(&self, article_id: ArticleId) -> QuireResult<u32> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    if article.review_rounds.is_empty() {
      article.review_rounds.push(ReviewRound::new(1));
      event!(Level::INFO, article = %article_id, "Opened review round 1.");
    }
    Ok(article.review_rounds.last().map(|r| r.number).unwrap_or(1))
  }

  pub fn add_review_file(&self, article_id: ArticleId, round: u32, file: FileRef) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let round = article
      .review_rounds
      .iter_mut()
      .find(|r| r.number == round)
      .ok_or_else(|| QuireError::not_found("review round", round))?;
    round.review_files.push(file);
    Ok(())
  }

  /// Opens the next review round. Every assignment still open anywhere on
  /// the article is force-withdrawn first, raising a closure event per
  /// reviewer, and the article returns to Under Review.
  #[instrument(skip(self, ctx), fields(article = %article_id), err(Display))]
  pub fn open_new_round(&self, article_id: ArticleId, ctx: &NotificationContext) -> QuireResult<u32> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let next_number;
    {
      let mut article = handle.lock();
      let now = Utc::now();
      for round in &mut article.review_rounds {
        for assignment in &mut round.assignments {
          if !assignment.is_complete {
            assignment.date_complete = Some(now);
            assignment.is_complete = true;
            assignment.decision = Some(Recommendation::Withdrawn);
            events.push(Event::ReviewClosed(ReviewPayload {
              article: article_id,
              assignment: assignment.id,
              round: round.number,
              reviewer: assignment.reviewer,
              decision: assignment.decision,
              ctx: ctx.clone(),
            }));
          }
        }
      }
      next_number = article.review_rounds.last().map_or(1, |r| r.number + 1);
      article.review_rounds.push(ReviewRound::new(next_number));
      article.set_stage(Stage::UnderReview, &mut events);
    }
    self.bus.raise_all(&events)?;
    Ok(next_number)
  }

  /// Deletes a review round. The current round is never deletable, and
  /// neither is a round that has been actioned (holds assignments).
  pub fn delete_round(&self, article_id: ArticleId, round: u32) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      if article.current_review_round().map(|r| r.number) == Some(round) {
        return Err(QuireError::precondition(
          "delete_round",
          article_id,
          "a non-current review round",
          format!("round {round} is current"),
        ));
      }
      let index = article
        .review_rounds
        .iter()
        .position(|r| r.number == round)
        .ok_or_else(|| QuireError::not_found("review round", round))?;
      if !article.review_rounds[index].assignments.is_empty() {
        return Err(QuireError::precondition(
          "delete_round",
          article_id,
          "a round with no review assignments",
          format!("round {round} has assignments"),
        ));
      }
      article.review_rounds.remove(index);
      event!(Level::WARN, article = %article_id, round, "Review round deleted.");
      if article.is_under_revision() {
        article.set_stage(Stage::UnderRevision, &mut events);
      }
    }
    self.bus.raise_all(&events)
  }

  /// Assigns a reviewer on the current round. Requires the reviewer role,
  /// an open round, and review files on that round; the article moves to
  /// Under Review.
  #[instrument(skip(self, ctx), fields(article = %article_id, %reviewer), err(Display))]
  pub fn assign_reviewer(
    &self,
    article_id: ArticleId,
    reviewer: UserId,
    editor: UserId,
    date_due: DateTime<Utc>,
    visibility: ReviewVisibility,
    ctx: &NotificationContext,
  ) -> QuireResult<ReviewAssignmentId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = ReviewAssignmentId(self.store.allocate_id());
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.has_role(reviewer, Role::Reviewer, journal) {
        return Err(QuireError::NotAReviewer {
          user: reviewer,
          journal,
        });
      }
      let round_number = {
        let round = article.current_review_round_mut().ok_or_else(|| {
          QuireError::precondition(
            "assign_reviewer",
            article_id,
            "an open review round",
            "no review rounds",
          )
        })?;
        if round.review_files.is_empty() {
          return Err(QuireError::NoReviewFiles {
            article: article_id,
            round: round.number,
          });
        }
        if round.assignments.iter().any(|a| a.reviewer == reviewer && !a.is_complete) {
          return Err(QuireError::DuplicateAssignment {
            article: article_id,
            user: reviewer,
          });
        }
        round
          .assignments
          .push(ReviewAssignment::new(id, round.number, reviewer, editor, date_due, visibility));
        round.number
      };
      article.set_stage(Stage::UnderReview, &mut events);
      events.push(Event::ReviewerRequested(ReviewPayload {
        article: article_id,
        assignment: id,
        round: round_number,
        reviewer,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.store.index_review_assignment(id, article_id);
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  /// The reviewer takes the assignment on. Reachable by account identity
  /// or access code.
  pub fn accept_review(
    &self,
    assignment_id: ReviewAssignmentId,
    key: ReviewerKey,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let (article_id, handle) = self.store.article_for_assignment(assignment_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let stage = article.stage;
      let assignment = article
        .review_assignment_mut(assignment_id)
        .ok_or_else(|| QuireError::not_found("review assignment", assignment_id))?;
      if !key.matches(assignment) {
        return Err(QuireError::not_found("review assignment", assignment_id));
      }
      if assignment.is_complete {
        return Err(QuireError::precondition(
          "accept_review",
          article_id,
          "an open review assignment",
          "assignment already closed",
        ));
      }
      if stage != Stage::UnderReview {
        return Err(QuireError::precondition(
          "accept_review",
          article_id,
          Stage::UnderReview.name(),
          stage,
        ));
      }
      assignment.date_accepted = Some(Utc::now());
      events.push(Event::ReviewerAccepted(ReviewPayload {
        article: article_id,
        assignment: assignment_id,
        round: assignment.round,
        reviewer: assignment.reviewer,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// The reviewer turns the assignment down; it closes immediately.
  pub fn decline_review(
    &self,
    assignment_id: ReviewAssignmentId,
    key: ReviewerKey,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let (article_id, handle) = self.store.article_for_assignment(assignment_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let stage = article.stage;
      let assignment = article
        .review_assignment_mut(assignment_id)
        .ok_or_else(|| QuireError::not_found("review assignment", assignment_id))?;
      if !key.matches(assignment) {
        return Err(QuireError::not_found("review assignment", assignment_id));
      }
      if assignment.is_complete {
        return Err(QuireError::precondition(
          "decline_review",
          article_id,
          "an open review assignment",
          "assignment already closed",
        ));
      }
      if stage != Stage::UnderReview {
        return Err(QuireError::precondition(
          "decline_review",
          article_id,
          Stage::UnderReview.name(),
          stage,
        ));
      }
      let now = Utc::now();
      assignment.date_declined = Some(now);
      assignment.date_complete = Some(now);
      assignment.date_accepted = None;
      assignment.is_complete = true;
      events.push(Event::ReviewerDeclined(ReviewPayload {
        article: article_id,
        assignment: assignment_id,
        round: assignment.round,
        reviewer: assignment.reviewer,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Files the review. Required form fields must be answered unless a
  /// review file substitutes for the form. A reviewer who skipped the
  /// explicit accept step gets `date_accepted` back-filled here.
  #[instrument(skip_all, fields(assignment = %assignment_id), err(Display))]
  pub fn complete_review(
    &self,
    assignment_id: ReviewAssignmentId,
    key: ReviewerKey,
    recommendation: Recommendation,
    answers: Vec<ReviewAnswer>,
    review_file: Option<FileRef>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let (article_id, handle) = self.store.article_for_assignment(assignment_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let stage = article.stage;
      let assignment = article
        .review_assignment_mut(assignment_id)
        .ok_or_else(|| QuireError::not_found("review assignment", assignment_id))?;
      if !key.matches(assignment) {
        return Err(QuireError::not_found("review assignment", assignment_id));
      }
      if assignment.is_complete {
        return Err(QuireError::precondition(
          "complete_review",
          article_id,
          "an open review assignment",
          "assignment already closed",
        ));
      }
      if stage != Stage::UnderReview {
        return Err(QuireError::precondition(
          "complete_review",
          article_id,
          Stage::UnderReview.name(),
          stage,
        ));
      }
      if review_file.is_none() && !self.forms.required_answered(&answers) {
        return Err(QuireError::precondition(
          "complete_review",
          article_id,
          "answers to all required form fields, or a review file",
          "incomplete review form",
        ));
      }
      let now = Utc::now();
      if assignment.date_accepted.is_none() {
        assignment.date_accepted = Some(now);
      }
      assignment.answers = answers;
      assignment.review_file = review_file;
      assignment.decision = Some(recommendation);
      assignment.date_complete = Some(now);
      assignment.is_complete = true;
      events.push(Event::ReviewComplete(ReviewPayload {
        article: article_id,
        assignment: assignment_id,
        round: assignment.round,
        reviewer: assignment.reviewer,
        decision: Some(recommendation),
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Editor-side withdrawal of an assignment that has not completed.
  pub fn withdraw_review(
    &self,
    assignment_id: ReviewAssignmentId,
    editor: UserId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let (article_id, handle) = self.store.article_for_assignment(assignment_id)?;
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
      let assignment = article
        .review_assignment_mut(assignment_id)
        .ok_or_else(|| QuireError::not_found("review assignment", assignment_id))?;
      if assignment.is_complete {
        return Err(QuireError::precondition(
          "withdraw_review",
          article_id,
          "an open review assignment",
          "assignment already closed",
        ));
      }
      let now = Utc::now();
      assignment.decision = Some(Recommendation::Withdrawn);
      assignment.date_complete = Some(now);
      assignment.is_complete = true;
      events.push(Event::ReviewWithdrawn(ReviewPayload {
        article: article_id,
        assignment: assignment_id,
        round: assignment.round,
        reviewer: assignment.reviewer,
        decision: assignment.decision,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Reopens an assignment regardless of its current state, clearing
  /// completion, decline and decision fields. Deliberately permissive;
  /// the reset is logged loudly instead of gated.
  pub fn reset_review(&self, assignment_id: ReviewAssignmentId, editor: UserId) -> QuireResult<()> {
    let (article_id, handle) = self.store.article_for_assignment(assignment_id)?;
    let mut article = handle.lock();
    let journal = article.journal;
    if !self.roles.is_editor(editor, journal) {
      return Err(QuireError::NotAnEditor {
        user: editor,
        journal,
      });
    }
    let assignment = article
      .review_assignment_mut(assignment_id)
      .ok_or_else(|| QuireError::not_found("review assignment", assignment_id))?;
    let previous = assignment.status();
    assignment.is_complete = false;
    assignment.date_complete = None;
    assignment.date_declined = None;
    assignment.decision = None;
    event!(
      Level::WARN,
      article = %article_id,
      assignment = %assignment_id,
      %editor,
      previous_status = ?previous,
      "Review assignment reset to open."
    );
    Ok(())
  }
}
