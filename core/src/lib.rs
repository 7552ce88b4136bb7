// src/lib.rs

//! Quire: an editorial workflow engine for scholarly journals.
//!
//! Quire models the editorial life of an article (submission, peer
//! review, revisions, decisions, production, proofing, publication) as a
//! stage machine coordinated by a synchronous typed event bus:
//!  - Every operation validates its stage precondition, mutates under a
//!    per-article lock, and raises its events after the lock is released.
//!  - Events are a tagged union with typed payloads; handlers run inline,
//!    in registration order, and may chain-raise on the same bus.
//!  - Journals carry an ordered list of workflow elements; the registry
//!    advances articles between elements when components announce
//!    completion.
//!  - Identity, role checks, form validation and file bytes stay behind
//!    traits supplied by the host application.

pub mod decision;
pub mod error;
pub mod events;
pub mod files;
pub mod identity;
pub mod journal;
pub mod lifecycle;
pub mod production;
pub mod proofing;
pub mod review;
pub mod revision;
pub mod store;
pub mod submission;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::error::{QuireError, QuireResult};

pub use crate::events::{Event, EventBus, EventKind, NotificationContext};

pub use crate::identity::{InMemoryRoles, Role, RoleDirectory, UserId};
pub use crate::journal::{Journal, JournalId};
pub use crate::files::{FileRef, FileStore, InMemoryFiles};

pub use crate::store::ArticleStore;
pub use crate::submission::{Article, ArticleId, EditorType, Stage};

pub use crate::lifecycle::ArticleLifecycle;
pub use crate::review::{
  AnswersRequired, FormValidator, Recommendation, ReviewAssignmentId, ReviewManager, ReviewVisibility,
  ReviewerKey,
};
pub use crate::revision::{RevisionId, RevisionManager, RevisionType, DEFAULT_REVISION_DAYS};
pub use crate::decision::{Decision, DecisionManager, DraftId, DraftVerdict};
pub use crate::production::{ProductionManager, TaskDecision, TaskStatus, TypesetTaskId};
pub use crate::proofing::{CorrectionTaskId, ProofingManager, ProofingTaskId};
pub use crate::workflow::{default_elements, WorkflowElement, WorkflowRegistry};
