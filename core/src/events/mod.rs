// quire/src/events/mod.rs

//! The typed event bus: lifecycle events as a tagged union with
//! strongly-typed payloads, plus the synchronous dispatcher components
//! subscribe to.

pub mod bus;
pub mod payload;

pub use bus::{EventBus, EventHandler};
pub use payload::{
  ArticlePayload, CorrectionPayload, DecisionPayload, DraftPayload, EditorAssignedPayload, Event,
  EventKind, ManagerPayload, NotificationContext, ProofingPayload, PublicationPayload,
  ReviewPayload, RevisionPayload, StageChangePayload, TypesetPayload, WorkflowPayload,
};
