// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use std::sync::Arc;

use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::Level;

use quire::decision::DecisionManager;
use quire::events::{Event, EventBus, EventKind, NotificationContext};
use quire::files::FileRef;
use quire::identity::{InMemoryRoles, Role, RoleDirectory, UserId};
use quire::journal::JournalId;
use quire::lifecycle::ArticleLifecycle;
use quire::production::ProductionManager;
use quire::proofing::ProofingManager;
use quire::review::{AnswersRequired, ReviewAssignmentId, ReviewManager, ReviewVisibility};
use quire::revision::RevisionManager;
use quire::store::ArticleStore;
use quire::submission::{ArticleId, Author, EditorType, Stage};
use quire::workflow::WorkflowRegistry;

// --- Well-known principals used across the test suites ---
pub const JOURNAL: JournalId = JournalId(1);
pub const EDITOR: UserId = UserId(10);
pub const SECTION_EDITOR: UserId = UserId(11);
pub const AUTHOR: UserId = UserId(20);
pub const REVIEWER: UserId = UserId(30);
pub const SECOND_REVIEWER: UserId = UserId(31);
pub const PRODUCTION_MANAGER: UserId = UserId(40);
pub const TYPESETTER: UserId = UserId(41);
pub const PROOFING_MANAGER: UserId = UserId(50);
pub const PROOFREADER: UserId = UserId(51);

/// Records every event kind the bus dispatches, in dispatch order.
#[derive(Clone, Default)]
pub struct EventRecorder {
  seen: Arc<Mutex<Vec<EventKind>>>,
}

impl EventRecorder {
  pub fn install(bus: &EventBus) -> Self {
    let recorder = Self::default();
    for kind in EventKind::ALL {
      let seen = recorder.seen.clone();
      bus.register(*kind, move |_bus, event: &Event| {
        seen.lock().push(event.kind());
        Ok(())
      });
    }
    recorder
  }

  pub fn kinds(&self) -> Vec<EventKind> {
    self.seen.lock().clone()
  }

  pub fn count(&self, kind: EventKind) -> usize {
    self.seen.lock().iter().filter(|k| **k == kind).count()
  }

  pub fn clear(&self) {
    self.seen.lock().clear();
  }
}

/// One fully wired engine: store, bus, registry, managers, and a
/// recorder subscribed to every event kind.
pub struct Fixture {
  pub store: Arc<ArticleStore>,
  pub bus: Arc<EventBus>,
  pub registry: Arc<WorkflowRegistry>,
  pub roles: Arc<InMemoryRoles>,
  pub lifecycle: ArticleLifecycle,
  pub reviews: ReviewManager,
  pub revisions: RevisionManager,
  pub decisions: DecisionManager,
  pub production: ProductionManager,
  pub proofing: ProofingManager,
  pub recorder: EventRecorder,
}

impl Fixture {
  pub fn new() -> Self {
    setup_tracing();
    let store = Arc::new(ArticleStore::new());
    let bus = Arc::new(EventBus::new());
    let registry = Arc::new(WorkflowRegistry::new());
    let roles = Arc::new(InMemoryRoles::new());

    roles.grant(EDITOR, Role::Editor, JOURNAL);
    roles.grant(SECTION_EDITOR, Role::SectionEditor, JOURNAL);
    roles.grant(AUTHOR, Role::Author, JOURNAL);
    roles.grant(REVIEWER, Role::Reviewer, JOURNAL);
    roles.grant(SECOND_REVIEWER, Role::Reviewer, JOURNAL);
    roles.grant(PRODUCTION_MANAGER, Role::Production, JOURNAL);
    roles.grant(TYPESETTER, Role::Typesetter, JOURNAL);
    roles.grant(PROOFING_MANAGER, Role::ProofingManager, JOURNAL);
    roles.grant(PROOFREADER, Role::Proofreader, JOURNAL);

    // Recorder first so it sees events before the registry chain-raises.
    let recorder = EventRecorder::install(&bus);
    WorkflowRegistry::wire(registry.clone(), &bus, store.clone());

    let roles_dyn: Arc<dyn RoleDirectory> = roles.clone();
    let lifecycle = ArticleLifecycle::new(store.clone(), bus.clone(), registry.clone(), roles_dyn.clone());
    let reviews = ReviewManager::new(
      store.clone(),
      bus.clone(),
      roles_dyn.clone(),
      Arc::new(AnswersRequired),
    );
    let revisions = RevisionManager::new(store.clone(), bus.clone(), roles_dyn.clone());
    let decisions = DecisionManager::new(store.clone(), bus.clone(), roles_dyn.clone(), lifecycle.clone());
    let production = ProductionManager::new(store.clone(), bus.clone(), roles_dyn.clone());
    let proofing = ProofingManager::new(store.clone(), bus.clone(), roles_dyn);

    Self {
      store,
      bus,
      registry,
      roles,
      lifecycle,
      reviews,
      revisions,
      decisions,
      production,
      proofing,
      recorder,
    }
  }

  pub fn ctx(&self) -> NotificationContext {
    NotificationContext::new(JOURNAL, Some(EDITOR)).with_base_url("https://journal.example")
  }

  /// A fresh article with a manuscript file and one author, submitted.
  pub fn submitted_article(&self) -> ArticleId {
    let id = self.store.create_article(JOURNAL, AUTHOR, "Migration patterns of the barnacle goose");
    {
      let handle = self.store.article(id).unwrap();
      let mut article = handle.lock();
      article.manuscript_files.push(FileRef::new());
      article.authors.push(Author {
        user: AUTHOR,
        first_name: "Ada".to_string(),
        last_name: "Author".to_string(),
        institution: "Example University".to_string(),
      });
    }
    self.lifecycle.submit(id, &self.ctx()).unwrap();
    id
  }

  /// Submitted, editor assigned, moved to review, round one stocked with
  /// a review file.
  pub fn article_in_review(&self) -> ArticleId {
    let id = self.submitted_article();
    self
      .lifecycle
      .assign_editor(id, EDITOR, EditorType::Editor, &self.ctx(), false)
      .unwrap();
    let round = self.lifecycle.move_to_review(id, &self.ctx()).unwrap();
    self.reviews.add_review_file(id, round, FileRef::new()).unwrap();
    id
  }

  /// An article in review with one open assignment for `REVIEWER`.
  pub fn assignment_in_review(&self) -> (ArticleId, ReviewAssignmentId) {
    let id = self.article_in_review();
    let assignment = self
      .reviews
      .assign_reviewer(
        id,
        REVIEWER,
        EDITOR,
        Utc::now() + Duration::days(14),
        ReviewVisibility::DoubleBlind,
        &self.ctx(),
      )
      .unwrap();
    (id, assignment)
  }

  pub fn stage(&self, id: ArticleId) -> Stage {
    self.store.article(id).unwrap().lock().stage
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
