// tests/revision_decision_tests.rs

mod common;

use chrono::{Duration, Utc};

use quire::decision::{Decision, DraftVerdict};
use quire::events::EventKind;
use quire::revision::RevisionType;
use quire::submission::Stage;
use quire::QuireError;

use common::*;

#[test]
fn the_author_completes_their_own_revisions() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let revision = fx
    .lifecycle
    .request_revisions(id, EDITOR, RevisionType::MinorRevisions, "Tighten section 3", None, &fx.ctx())
    .unwrap();
  assert_eq!(fx.stage(id), Stage::UnderRevision);

  let err = fx
    .revisions
    .complete_revisions(id, revision, REVIEWER, None, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::Precondition { operation: "complete_revisions", .. }));

  fx.revisions
    .log_action(id, revision, AUTHOR, "Replaced manuscript file")
    .unwrap();
  fx.revisions
    .complete_revisions(id, revision, AUTHOR, Some("Section 3 rewritten".to_string()), &fx.ctx())
    .unwrap();

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let request = article.revision_requests.iter().find(|r| r.id == revision).unwrap();
  assert!(request.is_complete());
  assert_eq!(request.author_note.as_deref(), Some("Section 3 rewritten"));
  // The manual entry plus the automatic completion entry.
  assert_eq!(request.actions.len(), 2);
  // Completion does not move the stage; that is the editor's next call.
  assert_eq!(article.stage, Stage::UnderRevision);
  drop(article);
  assert_eq!(fx.recorder.count(EventKind::RevisionsComplete), 1);
}

#[test]
fn a_request_completes_only_once() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let revision = fx
    .lifecycle
    .request_revisions(id, EDITOR, RevisionType::MinorRevisions, "Minor fixes", None, &fx.ctx())
    .unwrap();
  fx.revisions
    .complete_revisions(id, revision, AUTHOR, None, &fx.ctx())
    .unwrap();
  let err = fx
    .revisions
    .complete_revisions(id, revision, AUTHOR, None, &fx.ctx())
    .unwrap_err();
  assert!(matches!(err, QuireError::Precondition { .. }));
  assert!(matches!(
    fx.revisions.log_action(id, revision, AUTHOR, "late note").unwrap_err(),
    QuireError::Precondition { .. }
  ));
}

#[test]
fn due_dates_move_only_while_outstanding() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let revision = fx
    .lifecycle
    .request_revisions(id, EDITOR, RevisionType::MajorRevisions, "Redo analysis", None, &fx.ctx())
    .unwrap();
  let new_due = Utc::now() + Duration::days(30);

  assert!(matches!(
    fx.revisions.update_due_date(id, revision, AUTHOR, new_due).unwrap_err(),
    QuireError::NotAnEditor { .. }
  ));
  fx.revisions.update_due_date(id, revision, EDITOR, new_due).unwrap();

  fx.revisions
    .complete_revisions(id, revision, AUTHOR, None, &fx.ctx())
    .unwrap();
  assert!(matches!(
    fx.revisions.update_due_date(id, revision, EDITOR, new_due).unwrap_err(),
    QuireError::Precondition { .. }
  ));
}

#[test]
fn deleting_a_request_needs_a_rationale() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let revision = fx
    .lifecycle
    .request_revisions(id, EDITOR, RevisionType::MinorRevisions, "Minor fixes", None, &fx.ctx())
    .unwrap();
  let err = fx.revisions.delete(id, revision, EDITOR, "   ").unwrap_err();
  assert!(matches!(err, QuireError::Precondition { .. }));
}

#[test]
fn deleting_the_last_request_reopens_review() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let revision = fx
    .lifecycle
    .request_revisions(id, EDITOR, RevisionType::MinorRevisions, "Minor fixes", None, &fx.ctx())
    .unwrap();
  assert_eq!(fx.stage(id), Stage::UnderRevision);

  fx.revisions
    .delete(id, revision, EDITOR, "Requested by mistake")
    .unwrap();
  assert_eq!(fx.stage(id), Stage::UnderReview);
  assert!(fx.store.article(id).unwrap().lock().revision_requests.is_empty());
}

#[test]
fn approving_an_accept_draft_actions_the_acceptance() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::Accept, "Both reviews positive", &fx.ctx())
    .unwrap();
  assert_eq!(fx.recorder.count(EventKind::DraftDecision), 1);

  fx.decisions.approve(id, draft, EDITOR, &fx.ctx()).unwrap();
  assert_eq!(fx.stage(id), Stage::EditorCopyediting);
  assert_eq!(fx.recorder.count(EventKind::ArticleAccepted), 1);

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let draft = article.decision_drafts.iter().find(|d| d.id == draft).unwrap();
  assert!(draft.closed);
  assert_eq!(draft.editor_decision, Some(DraftVerdict::Accepted));
}

#[test]
fn a_draft_is_actioned_at_most_once() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::Decline, "Out of scope", &fx.ctx())
    .unwrap();
  fx.decisions.approve(id, draft, EDITOR, &fx.ctx()).unwrap();
  let err = fx.decisions.approve(id, draft, EDITOR, &fx.ctx()).unwrap_err();
  assert!(matches!(err, QuireError::AlreadyActioned { .. }));
  assert_eq!(fx.recorder.count(EventKind::ArticleDeclined), 1);
}

#[test]
fn declining_a_draft_actions_nothing() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::Accept, "Looks ready", &fx.ctx())
    .unwrap();
  fx.decisions.decline_draft(id, draft, EDITOR).unwrap();

  assert_eq!(fx.stage(id), Stage::UnderReview);
  assert_eq!(fx.recorder.count(EventKind::ArticleAccepted), 0);
  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let draft = article.decision_drafts.iter().find(|d| d.id == draft).unwrap();
  assert_eq!(draft.editor_decision, Some(DraftVerdict::Declined));
}

#[test]
fn a_revisions_draft_carries_its_rationale_into_the_request() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::MajorRevisions, "Statistics need rework", &fx.ctx())
    .unwrap();
  fx.decisions.approve(id, draft, EDITOR, &fx.ctx()).unwrap();

  assert_eq!(fx.stage(id), Stage::UnderRevision);
  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let request = &article.revision_requests[0];
  assert_eq!(request.revision_type, RevisionType::MajorRevisions);
  assert_eq!(request.editor_note, "Statistics need rework");
}

#[test]
fn a_failed_action_rolls_the_claim_back() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::Accept, "Ready", &fx.ctx())
    .unwrap();
  // The stage moves underneath the draft; accepting is no longer legal.
  fx.lifecycle.decline(id, &fx.ctx(), None, false).unwrap();

  let err = fx.decisions.approve(id, draft, EDITOR, &fx.ctx()).unwrap_err();
  assert!(matches!(err, QuireError::Precondition { .. }));

  let handle = fx.store.article(id).unwrap();
  let article = handle.lock();
  let draft = article.decision_drafts.iter().find(|d| d.id == draft).unwrap();
  assert!(!draft.closed);
  assert!(draft.editor_decision.is_none());
}

#[test]
fn racing_approvals_action_the_draft_exactly_once() {
  let fx = Fixture::new();
  let id = fx.article_in_review();
  let draft = fx
    .decisions
    .draft(id, SECTION_EDITOR, Decision::Accept, "Unanimous", &fx.ctx())
    .unwrap();

  let results: Vec<_> = std::thread::scope(|scope| {
    let handles: Vec<_> = (0..2)
      .map(|_| {
        let decisions = &fx.decisions;
        let ctx = fx.ctx();
        scope.spawn(move || decisions.approve(id, draft, EDITOR, &ctx))
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  let ok = results.iter().filter(|r| r.is_ok()).count();
  assert_eq!(ok, 1);
  assert!(results
    .iter()
    .any(|r| matches!(r, Err(QuireError::AlreadyActioned { .. }))));
  assert_eq!(fx.recorder.count(EventKind::ArticleAccepted), 1);
  assert_eq!(fx.stage(id), Stage::EditorCopyediting);
}
