// quire/src/workflow.rs

//! The workflow element registry. Each journal carries an ordered list of
//! enabled elements; when a component announces completion, the registry
//! looks up the next element for that journal and moves the article to
//! its entry stage. An article on a journal whose last element just
//! finished lands at prepublication.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

use crate::events::{Event, EventBus, EventKind};
use crate::journal::JournalId;
use crate::store::ArticleStore;
use crate::submission::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowElement {
  Review,
  Copyediting,
  Production,
  Proofing,
  Prepublication,
}

impl WorkflowElement {
  pub fn name(&self) -> &'static str {
    match self {
      WorkflowElement::Review => "review",
      WorkflowElement::Copyediting => "copyediting",
      WorkflowElement::Production => "production",
      WorkflowElement::Proofing => "proofing",
      WorkflowElement::Prepublication => "prepublication",
    }
  }

  /// The stage an article enters when this element begins.
  pub fn stage(&self) -> Stage {
    match self {
      WorkflowElement::Review => Stage::Assigned,
      WorkflowElement::Copyediting => Stage::EditorCopyediting,
      WorkflowElement::Production => Stage::Typesetting,
      WorkflowElement::Proofing => Stage::Proofing,
      WorkflowElement::Prepublication => Stage::ReadyForPublication,
    }
  }
}

impl fmt::Display for WorkflowElement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// The full element order used when a journal has no explicit workflow.
pub fn default_elements() -> Vec<WorkflowElement> {
  vec![
    WorkflowElement::Review,
    WorkflowElement::Copyediting,
    WorkflowElement::Production,
    WorkflowElement::Proofing,
    WorkflowElement::Prepublication,
  ]
}

pub struct WorkflowRegistry {
  workflows: RwLock<HashMap<JournalId, Vec<WorkflowElement>>>,
}

impl WorkflowRegistry {
  pub fn new() -> Self {
    Self {
      workflows: RwLock::new(HashMap::new()),
    }
  }

  /// Replaces the journal's element list. Order is significant.
  pub fn set_workflow(&self, journal: JournalId, elements: Vec<WorkflowElement>) {
    event!(Level::DEBUG, %journal, ?elements, "Journal workflow configured.");
    self.workflows.write().insert(journal, elements);
  }

  pub fn elements(&self, journal: JournalId) -> Vec<WorkflowElement> {
    self
      .workflows
      .read()
      .get(&journal)
      .cloned()
      .unwrap_or_else(default_elements)
  }

  pub fn contains(&self, journal: JournalId, element: WorkflowElement) -> bool {
    self.elements(journal).contains(&element)
  }

  /// Entry stage of the element after `current` for this journal, or
  /// prepublication when `current` is the last enabled element. `None`
  /// when `current` is not enabled at all.
  pub fn next_stage(&self, journal: JournalId, current: WorkflowElement) -> Option<Stage> {
    let elements = self.elements(journal);
    let position = elements.iter().position(|e| *e == current)?;
    Some(
      elements
        .get(position + 1)
        .map(|e| e.stage())
        .unwrap_or(Stage::ReadyForPublication),
    )
  }

  /// Subscribes the registry to element-completion events. On
  /// `switch_stage` it applies the next stage under the article lock and
  /// chain-raises the stage-change event through the same bus.
  pub fn wire(registry: Arc<Self>, bus: &EventBus, store: Arc<ArticleStore>) {
    bus.register(EventKind::WorkflowElementComplete, move |bus, event| {
      let Event::WorkflowElementComplete(payload) = event else {
        return Ok(());
      };
      if !payload.switch_stage {
        event!(
          Level::DEBUG,
          article = %payload.article,
          element = %payload.element,
          "Element complete; stage switch not requested."
        );
        return Ok(());
      }
      let handle = store.article(payload.article)?;
      let mut events = Vec::new();
      {
        let mut article = handle.lock();
        match registry.next_stage(article.journal, payload.element) {
          Some(next) => article.set_stage(next, &mut events),
          None => {
            event!(
              Level::WARN,
              article = %payload.article,
              element = %payload.element,
              journal = %article.journal,
              "Completed element is not enabled for this journal; stage unchanged."
            );
          }
        }
      }
      for chained in &events {
        bus.raise(chained)?;
      }
      Ok(())
    });
  }
}

impl Default for WorkflowRegistry {
  fn default() -> Self {
    Self::new()
  }
}
