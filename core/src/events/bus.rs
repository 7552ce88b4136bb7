// quire/src/events/bus.rs

//! The synchronous event dispatcher. An `EventBus` is an explicit,
//! injectable object; there is no process-wide registry. Handlers run
//! inline, in registration order, and the first failure aborts the rest
//! of the dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{event, instrument, span, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::payload::{Event, EventKind};

/// Type alias for an event handler.
///
/// A handler receives the bus itself (so it can chain-raise further
/// events) and the event being dispatched. Handler failures are reported
/// as `anyhow::Error` and wrapped into [`QuireError::Handler`] by the bus.
pub type EventHandler = Arc<dyn Fn(&EventBus, &Event) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
  handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends `handler` to the ordered list for `kind`.
  pub fn register<F>(&self, kind: EventKind, handler: F)
  where
    F: Fn(&EventBus, &Event) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.handlers.write().entry(kind).or_default().push(Arc::new(handler));
    event!(Level::DEBUG, kind = %kind, "Event handler registered.");
  }

  pub fn handler_count(&self, kind: EventKind) -> usize {
    self.handlers.read().get(&kind).map_or(0, Vec::len)
  }

  /// Dispatches `event` to every registered handler, synchronously and in
  /// registration order.
  ///
  /// The handler list is snapshotted before the first invocation, so
  /// handlers may register further handlers or chain-raise on the same bus
  /// without deadlocking. A failing handler aborts the remaining handlers
  /// for this event and the error bubbles up to the caller; by the time
  /// `raise` runs, all state mutation for the operation is already
  /// committed, so a failure leaves state consistent but un-notified.
  #[instrument(name = "EventBus::raise", skip_all, fields(kind = %event.kind()), err(Display))]
  pub fn raise(&self, event: &Event) -> QuireResult<()> {
    let kind = event.kind();
    let snapshot: Vec<EventHandler> = self
      .handlers
      .read()
      .get(&kind)
      .cloned()
      .unwrap_or_default();

    if snapshot.is_empty() {
      event!(Level::TRACE, "No handlers registered for event.");
      return Ok(());
    }

    for (index, handler) in snapshot.iter().enumerate() {
      let handler_span = span!(Level::DEBUG, "handler", index);
      let _enter = handler_span.enter();
      event!(Level::TRACE, "Invoking handler.");
      handler(self, event).map_err(|source| {
        event!(
          Level::ERROR,
          error = %source,
          index,
          "Handler failed; aborting remaining handlers for this event."
        );
        QuireError::Handler {
          event: kind.name(),
          source,
        }
      })?;
    }
    Ok(())
  }

  /// Raises a batch of events in order, stopping at the first failure.
  pub fn raise_all(&self, events: &[Event]) -> QuireResult<()> {
    for event in events {
      self.raise(event)?;
    }
    Ok(())
  }
}
