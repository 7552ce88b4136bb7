// tests/review_tests.rs

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use quire::events::EventKind;
use quire::files::FileRef;
use quire::review::{
  Recommendation, ReviewAnswer, ReviewStatus, ReviewVisibility, ReviewerKey,
};
use quire::submission::Stage;
use quire::QuireError;

use common::*;

fn due() -> chrono::DateTime<Utc> {
  Utc::now() + Duration::days(14)
}

fn answers() -> Vec<ReviewAnswer> {
  vec![ReviewAnswer {
    element: "soundness".to_string(),
    answer: "Methods hold up".to_string(),
  }]
}

#[test]
fn assigning_a_reviewer_requires_the_role() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let err = fx
    .reviews
    .assign_reviewer(id, AUTHOR, EDITOR, due(), ReviewVisibility::DoubleBlind, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::NotAReviewer { .. }));
}

#[test]
fn assigning_a_reviewer_requires_review_files() {
  let fx = Fixture::new();
  let id = fx.submitted_article();
  fx.lifecycle
    .assign_editor(id, EDITOR, quire::submission::EditorType::Editor, &fx.ctx(), false)
    .unwrap();
  fx.lifecycle.move_to_review(id, &fx.ctx()).unwrap();

  // Round one exists but holds no files yet.
  let err = fx
    .reviews
    .assign_reviewer(id, REVIEWER, EDITOR, due(), ReviewVisibility::DoubleBlind, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::NoReviewFiles { round: 1, .. }));
}

#[test]
fn assignment_moves_the_article_under_review() {
  let fx = Fixture::new();
  let (id, _assignment) = fx.assignment_in_review();
  assert_eq!(fx.stage(id), Stage::UnderReview);
  assert_eq!(fx.recorder.count(EventKind::ReviewerRequested), 1);
}

#[test]
fn a_reviewer_cannot_hold_two_open_assignments() {
  let fx = Fixture::new();
  let (id, _assignment) = fx.assignment_in_review();
  let err = fx
    .reviews
    .assign_reviewer(id, REVIEWER, EDITOR, due(), ReviewVisibility::DoubleBlind, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::DuplicateAssignment { .. }));
}

#[test]
fn access_code_and_identity_resolve_the_same_assignment() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();
  let code = {
    let handle = fx.store.article(id).unwrap();
    let article = handle.lock();
    article.review_assignment(assignment_id).unwrap().access_code
  };

  fx.reviews
    .accept_review(assignment_id, ReviewerKey::AccessCode(code), &fx.ctx())
    .unwrap();
  fx.reviews
    .complete_review(
      assignment_id,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::MinorRevisions,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let assignment = article.review_assignment(assignment_id).unwrap();
  assert_eq!(assignment.status(), ReviewStatus::Complete);
  assert_eq!(assignment.decision, Some(Recommendation::MinorRevisions));
}

#[test]
fn both_key_kinds_leave_identical_assignment_state() {
  let fx = Fixture::new();
  let (id, by_identity) = fx.assignment_in_review();
  let by_code = fx
    .reviews
    .assign_reviewer(id, SECOND_REVIEWER, EDITOR, due(), ReviewVisibility::DoubleBlind, &fx.ctx())
    .unwrap();
  let code = {
    let handle = fx.store.article(id).unwrap();
    let article = handle.lock();
    article.review_assignment(by_code).unwrap().access_code
  };

  // Same operations, one assignment driven by identity, one by code.
  fx.reviews
    .accept_review(by_identity, ReviewerKey::Reviewer(REVIEWER), &fx.ctx())
    .unwrap();
  fx.reviews
    .accept_review(by_code, ReviewerKey::AccessCode(code), &fx.ctx())
    .unwrap();
  fx.reviews
    .complete_review(
      by_identity,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::Accept,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();
  fx.reviews
    .complete_review(
      by_code,
      ReviewerKey::AccessCode(code),
      Recommendation::Accept,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let first = article.review_assignment(by_identity).unwrap();
  let second = article.review_assignment(by_code).unwrap();
  assert_eq!(first.status(), second.status());
  assert_eq!(first.is_complete, second.is_complete);
  assert_eq!(first.decision, second.decision);
  assert_eq!(first.date_accepted.is_some(), second.date_accepted.is_some());
  assert_eq!(first.date_complete.is_some(), second.date_complete.is_some());
  assert_eq!(first.date_declined, second.date_declined);
  assert_eq!(first.answers.len(), second.answers.len());
  assert_eq!(first.review_file, second.review_file);
}

#[test]
fn a_wrong_key_reads_as_missing() {
  let fx = Fixture::new();
  let (_id, assignment_id) = fx.assignment_in_review();

  let err = fx
    .reviews
    .accept_review(assignment_id, ReviewerKey::Reviewer(SECOND_REVIEWER), &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::NotFound { .. }));

  let err = fx
    .reviews
    .accept_review(assignment_id, ReviewerKey::AccessCode(Uuid::new_v4()), &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::NotFound { .. }));
}

#[test]
fn declining_closes_the_assignment() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();
  fx.reviews
    .decline_review(assignment_id, ReviewerKey::Reviewer(REVIEWER), &fx.ctx())
    .unwrap();

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let assignment = article.review_assignment(assignment_id).unwrap();
  assert_eq!(assignment.status(), ReviewStatus::Declined);
  assert!(assignment.date_accepted.is_none());
  // A declined assignment is a closed one: the completion date is stamped.
  assert!(assignment.date_complete.is_some());
  assert!(assignment.is_complete);
  drop(article);

  assert_eq!(fx.recorder.count(EventKind::ReviewerDeclined), 1);
  let err = fx
    .reviews
    .accept_review(assignment_id, ReviewerKey::Reviewer(REVIEWER), &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::Precondition { .. }));
}

#[test]
fn completing_backfills_the_acceptance_date() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();

  // Straight to completion, no explicit accept.
  fx.reviews
    .complete_review(
      assignment_id,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::Accept,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let assignment = article.review_assignment(assignment_id).unwrap();
  assert!(assignment.date_accepted.is_some());
  assert!(assignment.date_complete.is_some());
  drop(article);
  assert_eq!(fx.recorder.count(EventKind::ReviewComplete), 1);
}

#[test]
fn completion_needs_answers_or_a_review_file() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();

  let err = fx
    .reviews
    .complete_review(
      assignment_id,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::Accept,
      Vec::new(),
      None,
      &fx.ctx(),
    )
    .unwrap_err();
  assert!(matches!(err, QuireError::Precondition { operation: "complete_review", .. }));

  // An uploaded review file substitutes for the form.
  fx.reviews
    .complete_review(
      assignment_id,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::Accept,
      Vec::new(),
      Some(FileRef::new()),
      &fx.ctx(),
    )
    .unwrap();
  let handle = fx.store.article(id).unwrap();
  assert!(handle.lock().review_assignment(assignment_id).unwrap().is_complete);
}

#[test]
fn editors_can_withdraw_an_open_assignment() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();

  let err = fx
    .reviews
    .withdraw_review(assignment_id, AUTHOR, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::NotAnEditor { .. }));

  fx.reviews.withdraw_review(assignment_id, EDITOR, &fx.ctx()).unwrap();
  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let assignment = article.review_assignment(assignment_id).unwrap();
  assert_eq!(assignment.status(), ReviewStatus::Withdrawn);
  drop(article);
  assert_eq!(fx.recorder.count(EventKind::ReviewWithdrawn), 1);
}

#[test]
fn a_new_round_withdraws_everything_still_open() {
  let fx = Fixture::new();
  let (id, first) = fx.assignment_in_review();
  let second = fx
    .reviews
    .assign_reviewer(id, SECOND_REVIEWER, EDITOR, due(), ReviewVisibility::Blind, &fx.ctx())
    .unwrap();
  fx.reviews
    .complete_review(
      first,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::MajorRevisions,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();

  let round = fx.reviews.open_new_round(id, &fx.ctx()).unwrap();
  assert_eq!(round, 2);
  assert_eq!(fx.stage(id), Stage::UnderReview);
  // Only the still-open assignment was force-closed.
  assert_eq!(fx.recorder.count(EventKind::ReviewClosed), 1);

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  assert_eq!(article.review_rounds.len(), 2);
  assert_eq!(
    article.review_assignment(second).unwrap().decision,
    Some(Recommendation::Withdrawn)
  );
  assert_eq!(
    article.review_assignment(first).unwrap().decision,
    Some(Recommendation::MajorRevisions)
  );
}

#[test]
fn reset_reopens_a_closed_assignment() {
  let fx = Fixture::new();
  let (id, assignment_id) = fx.assignment_in_review();
  fx.reviews
    .accept_review(assignment_id, ReviewerKey::Reviewer(REVIEWER), &fx.ctx())
    .unwrap();
  fx.reviews
    .complete_review(
      assignment_id,
      ReviewerKey::Reviewer(REVIEWER),
      Recommendation::Reject,
      answers(),
      None,
      &fx.ctx(),
    )
    .unwrap();

  fx.reviews.reset_review(assignment_id, EDITOR).unwrap();
  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let assignment = article.review_assignment(assignment_id).unwrap();
  // Open again, decision gone, but the acceptance date survives.
  assert_eq!(assignment.status(), ReviewStatus::Accepted);
  assert!(assignment.decision.is_none());
  assert!(assignment.date_accepted.is_some());
}

#[test]
fn round_deletion_rules() {
  let fx = Fixture::new();
  let (id, _assignment) = fx.assignment_in_review();

  // The current round is never deletable.
  let err = fx.reviews.delete_round(id, 1).unwrap_err();
  assert!(matches!(err, QuireError::Precondition { operation: "delete_round", .. }));

  fx.reviews.open_new_round(id, &fx.ctx()).unwrap();
  // Round one is no longer current, but it was actioned.
  let err = fx.reviews.delete_round(id, 1).unwrap_err();
  assert!(matches!(err, QuireError::Precondition { .. }));

  // An empty, non-current round goes quietly.
  fx.reviews.open_new_round(id, &fx.ctx()).unwrap();
  fx.reviews.delete_round(id, 2).unwrap();
  let handle = fx.store.article(id).unwrap();
  let numbers: Vec<u32> = handle.lock().review_rounds.iter().map(|r| r.number).collect();
  assert_eq!(numbers, vec![1, 3]);
}

#[test]
fn ensure_current_round_repairs_a_roundless_article() {
  let fx = Fixture::new();
  let id = fx.submitted_article();
  assert_eq!(fx.reviews.ensure_current_round(id).unwrap(), 1);
  // Idempotent.
  assert_eq!(fx.reviews.ensure_current_round(id).unwrap(), 1);
  let handle = fx.store.article(id).unwrap();
  assert_eq!(handle.lock().review_rounds.len(), 1);
}
