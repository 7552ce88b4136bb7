// quire/examples/editorial_flow.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use quire::{
  ArticleLifecycle, ArticleStore, EventBus, EventKind, InMemoryRoles, NotificationContext,
  ProductionManager, ProofingManager, QuireError, Recommendation, ReviewManager, ReviewVisibility,
  ReviewerKey, Role, RoleDirectory, TaskDecision, UserId, WorkflowElement, WorkflowRegistry,
};
use quire::files::{FileRef, FileStore, InMemoryFiles};
use quire::journal::{Journal, JournalId};
use quire::review::{AnswersRequired, ReviewAnswer};
use quire::submission::{Author, EditorType};
use tracing::info;

fn main() -> Result<(), QuireError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Editorial Flow Example ---");

  // 1. Wire the engine: store, bus, workflow registry and a role directory.
  let store = Arc::new(ArticleStore::new());
  let bus = Arc::new(EventBus::new());
  let registry = Arc::new(WorkflowRegistry::new());
  let roles = Arc::new(InMemoryRoles::new());
  let files = InMemoryFiles::new();

  let ornithology = Journal::new(JournalId(1), "ornith", "Journal of Applied Ornithology");
  let journal = ornithology.id;
  let editor = UserId(1);
  let author = UserId(2);
  let reviewer = UserId(3);
  let typesetter = UserId(4);
  let proofreader = UserId(5);
  roles.grant(editor, Role::Editor, journal);
  roles.grant(author, Role::Author, journal);
  roles.grant(reviewer, Role::Reviewer, journal);
  roles.grant(editor, Role::Production, journal);
  roles.grant(typesetter, Role::Typesetter, journal);
  roles.grant(editor, Role::ProofingManager, journal);
  roles.grant(proofreader, Role::Proofreader, journal);

  // 2. A notification handler. Real deployments would render templates and
  //    send mail; this one just prints what it sees.
  for kind in EventKind::ALL {
    bus.register(*kind, |_bus, event| {
      info!(kind = %event.kind(), "event raised");
      Ok(())
    });
  }

  // 3. The registry listens for element completion and advances stages.
  WorkflowRegistry::wire(registry.clone(), &bus, store.clone());

  let roles_dyn: Arc<dyn RoleDirectory> = roles;
  let lifecycle = ArticleLifecycle::new(store.clone(), bus.clone(), registry, roles_dyn.clone());
  let reviews = ReviewManager::new(store.clone(), bus.clone(), roles_dyn.clone(), Arc::new(AnswersRequired));
  let production = ProductionManager::new(store.clone(), bus.clone(), roles_dyn.clone());
  let proofing = ProofingManager::new(store.clone(), bus.clone(), roles_dyn);

  // 4. The author prepares and submits an article.
  let ctx = NotificationContext::new(journal, Some(editor)).with_base_url("https://journal.example");
  let article = store.create_article(journal, author, "On the flight of unladen swallows");
  let manuscript = files.save_file(author, "manuscript.pdf", b"%PDF-1.7 ...".to_vec());
  {
    let handle = store.article(article)?;
    let mut article = handle.lock();
    article.manuscript_files.push(manuscript);
    article.authors.push(Author {
      user: author,
      first_name: "Avery".to_string(),
      last_name: "Author".to_string(),
      institution: "Example University".to_string(),
    });
  }
  lifecycle.submit(article, &ctx)?;

  // 5. Peer review: one reviewer, reached through the access code.
  lifecycle.assign_editor(article, editor, EditorType::Editor, &ctx, false)?;
  let round = lifecycle.move_to_review(article, &ctx)?;
  reviews.add_review_file(article, round, FileRef::new())?;
  let assignment = reviews.assign_reviewer(
    article,
    reviewer,
    editor,
    Utc::now() + Duration::days(14),
    ReviewVisibility::DoubleBlind,
    &ctx,
  )?;
  let code = {
    let handle = store.article(article)?;
    let article = handle.lock();
    article
      .review_assignment(assignment)
      .map(|a| a.access_code)
      .ok_or_else(|| QuireError::NotFound {
        entity: "review assignment",
        id: assignment.to_string(),
      })?
  };
  reviews.accept_review(assignment, ReviewerKey::AccessCode(code), &ctx)?;
  reviews.complete_review(
    assignment,
    ReviewerKey::AccessCode(code),
    Recommendation::Accept,
    vec![ReviewAnswer {
      element: "overall".to_string(),
      answer: "A sound and well-argued study.".to_string(),
    }],
    None,
    &ctx,
  )?;

  // 6. Accept; the registry hands the article on to copyediting, and a
  //    plain element-completion call moves it through to typesetting.
  lifecycle.accept(article, &ctx, None, false)?;
  lifecycle.complete_workflow_element(article, WorkflowElement::Copyediting, "")?;

  // 7. Production and proofing chains.
  production.assign_manager(article, editor, Some(editor))?;
  let task = production.assign_typesetter(article, typesetter, "Typeset galleys", Vec::new(), &ctx)?;
  production.typesetter_decision(article, task, typesetter, TaskDecision::Accepted, &ctx)?;
  production.complete_task(article, task, typesetter, vec![FileRef::new()], &ctx)?;
  production.production_done(article, editor, &ctx)?;

  proofing.assign_manager(article, editor, Some(editor), &ctx)?;
  let proof = proofing.assign_proofreader(article, proofreader, "Check the galleys", None, &ctx)?;
  proofing.proofreader_decision(article, proof, proofreader, TaskDecision::Accepted, &ctx)?;
  proofing.complete_task(article, proof, proofreader, vec![FileRef::new()], &ctx)?;
  proofing.proofing_done(article, editor, &ctx)?;

  // 8. Publish.
  lifecycle.publish(article, &ctx)?;
  let handle = store.article(article)?;
  let published = handle.lock();
  info!(
    stage = %published.stage,
    authors = published.frozen_authors.len(),
    "Article published."
  );
  assert_eq!(published.stage, quire::Stage::Published);

  Ok(())
}
