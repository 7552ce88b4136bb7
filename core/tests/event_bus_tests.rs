// tests/event_bus_tests.rs

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use quire::events::{Event, EventBus, EventKind, StageChangePayload};
use quire::submission::{ArticleId, Stage};
use quire::QuireError;

use common::setup_tracing;

fn stage_change_event() -> Event {
  Event::DestroyTasks(StageChangePayload {
    article: ArticleId(1),
    from: Stage::Unsubmitted,
    to: Stage::Unassigned,
  })
}

#[test]
fn handlers_run_in_registration_order() {
  setup_tracing();
  let bus = EventBus::new();
  let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

  for tag in [1u32, 2, 3] {
    let order = order.clone();
    bus.register(EventKind::DestroyTasks, move |_bus, _event| {
      order.lock().push(tag);
      Ok(())
    });
  }

  bus.raise(&stage_change_event()).unwrap();
  assert_eq!(*order.lock(), vec![1, 2, 3]);
}

#[test]
fn raising_without_handlers_is_ok() {
  setup_tracing();
  let bus = EventBus::new();
  assert!(bus.raise(&stage_change_event()).is_ok());
}

#[test]
fn failing_handler_aborts_remaining_handlers() {
  setup_tracing();
  let bus = EventBus::new();
  let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

  {
    let order = order.clone();
    bus.register(EventKind::DestroyTasks, move |_bus, _event| {
      order.lock().push("first");
      Ok(())
    });
  }
  bus.register(EventKind::DestroyTasks, |_bus, _event| {
    anyhow::bail!("notification backend unreachable")
  });
  {
    let order = order.clone();
    bus.register(EventKind::DestroyTasks, move |_bus, _event| {
      order.lock().push("third");
      Ok(())
    });
  }

  let err = bus.raise(&stage_change_event()).unwrap_err();
  match err {
    QuireError::Handler { event, source } => {
      assert_eq!(event, "destroy_tasks");
      assert!(source.to_string().contains("notification backend unreachable"));
    }
    other => panic!("expected Handler error, got {other:?}"),
  }
  // The first handler ran; the one after the failure did not.
  assert_eq!(*order.lock(), vec!["first"]);
}

#[test]
fn handlers_can_chain_raise_on_the_same_bus() {
  setup_tracing();
  let bus = EventBus::new();
  let seen: Arc<Mutex<Vec<EventKind>>> = Arc::new(Mutex::new(Vec::new()));

  {
    let seen = seen.clone();
    bus.register(EventKind::WorkflowElementComplete, move |bus, _event| {
      seen.lock().push(EventKind::WorkflowElementComplete);
      bus.raise(&stage_change_event())?;
      Ok(())
    });
  }
  {
    let seen = seen.clone();
    bus.register(EventKind::DestroyTasks, move |_bus, event| {
      seen.lock().push(event.kind());
      Ok(())
    });
  }

  bus
    .raise(&Event::WorkflowElementComplete(quire::events::WorkflowPayload {
      article: ArticleId(1),
      element: quire::workflow::WorkflowElement::Review,
      handshake_url: String::new(),
      switch_stage: false,
    }))
    .unwrap();

  assert_eq!(
    *seen.lock(),
    vec![EventKind::WorkflowElementComplete, EventKind::DestroyTasks]
  );
}

#[test]
fn chained_failure_surfaces_through_the_outer_raise() {
  setup_tracing();
  let bus = EventBus::new();

  bus.register(EventKind::WorkflowElementComplete, |bus, _event| {
    bus.raise(&stage_change_event())?;
    Ok(())
  });
  bus.register(EventKind::DestroyTasks, |_bus, _event| {
    anyhow::bail!("task teardown failed")
  });

  let err = bus
    .raise(&Event::WorkflowElementComplete(quire::events::WorkflowPayload {
      article: ArticleId(1),
      element: quire::workflow::WorkflowElement::Review,
      handshake_url: String::new(),
      switch_stage: false,
    }))
    .unwrap_err();
  // The inner failure is wrapped once more by the outer dispatch.
  match err {
    QuireError::Handler { event, .. } => assert_eq!(event, "on_workflow_element_complete"),
    other => panic!("expected Handler error, got {other:?}"),
  }
}

#[test]
fn raise_all_stops_at_first_failure() {
  setup_tracing();
  let bus = EventBus::new();
  let count: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));

  {
    let count = count.clone();
    bus.register(EventKind::DestroyTasks, move |_bus, _event| {
      let mut count = count.lock();
      *count += 1;
      if *count == 2 {
        anyhow::bail!("second dispatch fails")
      }
      Ok(())
    });
  }

  let events = vec![stage_change_event(), stage_change_event(), stage_change_event()];
  assert!(bus.raise_all(&events).is_err());
  // Third event never dispatched.
  assert_eq!(*count.lock(), 2);
}
