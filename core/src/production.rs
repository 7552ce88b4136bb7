// quire/src/production.rs

//! The production chain: a production manager owns the article while it is
//! typeset, delegating typeset tasks that each walk the
//! assigned → accepted/declined → completed chain (or get cancelled).
//! Closing the assignment hands the workflow on to proofing.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::{ArticlePayload, Event, EventBus, NotificationContext, TypesetPayload, WorkflowPayload};
use crate::files::FileRef;
use crate::identity::{Role, RoleDirectory, UserId};
use crate::store::ArticleStore;
use crate::submission::ArticleId;
use crate::workflow::WorkflowElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypesetTaskId(pub u64);

impl fmt::Display for TypesetTaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Accept-or-decline response of a task assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDecision {
  Accepted,
  Declined,
}

/// Derived state of a delegated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Assigned,
  Accepted,
  Declined,
  Completed,
  Cancelled,
}

impl TaskStatus {
  pub fn slug(&self) -> &'static str {
    match self {
      TaskStatus::Assigned => "assigned",
      TaskStatus::Accepted => "accepted",
      TaskStatus::Declined => "declined",
      TaskStatus::Completed => "completed",
      TaskStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

/// Shared status derivation: a declined task carries a completion date but
/// no acceptance date.
pub(crate) fn task_status(
  cancelled: bool,
  accepted: Option<DateTime<Utc>>,
  completed: Option<DateTime<Utc>>,
) -> TaskStatus {
  if cancelled {
    TaskStatus::Cancelled
  } else if completed.is_some() {
    if accepted.is_some() {
      TaskStatus::Completed
    } else {
      TaskStatus::Declined
    }
  } else if accepted.is_some() {
    TaskStatus::Accepted
  } else {
    TaskStatus::Assigned
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypesetTask {
  pub id: TypesetTaskId,
  pub typesetter: UserId,
  pub assigned: DateTime<Utc>,
  pub notified: bool,
  pub accepted: Option<DateTime<Utc>>,
  pub completed: Option<DateTime<Utc>>,
  pub cancelled: bool,
  pub editor_reviewed: bool,
  pub description: String,
  pub files: Vec<FileRef>,
}

impl TypesetTask {
  pub fn status(&self) -> TaskStatus {
    task_status(self.cancelled, self.accepted, self.completed)
  }

  fn is_open(&self) -> bool {
    !self.cancelled && self.completed.is_none()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionAssignment {
  pub production_manager: UserId,
  pub editor: Option<UserId>,
  pub assigned: DateTime<Utc>,
  pub notified: bool,
  pub closed: Option<DateTime<Utc>>,
  pub tasks: Vec<TypesetTask>,
}

impl ProductionAssignment {
  pub fn open_tasks(&self) -> usize {
    self.tasks.iter().filter(|t| t.is_open()).count()
  }
}

pub struct ProductionManager {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  roles: Arc<dyn RoleDirectory>,
}

impl ProductionManager {
  pub fn new(store: Arc<ArticleStore>, bus: Arc<EventBus>, roles: Arc<dyn RoleDirectory>) -> Self {
    Self { store, bus, roles }
  }

  /// Puts a production manager on the article. One assignment per article.
  pub fn assign_manager(
    &self,
    article_id: ArticleId,
    manager: UserId,
    editor: Option<UserId>,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let journal = article.journal;
    if !self.roles.has_role(manager, Role::Production, journal) {
      return Err(QuireError::MissingRole {
        user: manager,
        role: Role::Production,
        journal,
      });
    }
    if article.production.is_some() {
      return Err(QuireError::precondition(
        "assign_production_manager",
        article_id,
        "no existing production assignment",
        "production manager already assigned",
      ));
    }
    article.production = Some(ProductionAssignment {
      production_manager: manager,
      editor,
      assigned: Utc::now(),
      notified: false,
      closed: None,
      tasks: Vec::new(),
    });
    event!(Level::INFO, article = %article_id, %manager, "Production manager assigned.");
    Ok(())
  }

  /// Removes the production assignment; refused while typeset tasks are
  /// still open.
  pub fn unassign_manager(&self, article_id: ArticleId) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let production = article.production.as_ref().ok_or_else(|| {
      QuireError::precondition(
        "unassign_production_manager",
        article_id,
        "a production assignment",
        "no production assignment",
      )
    })?;
    if production.open_tasks() > 0 {
      return Err(QuireError::precondition(
        "unassign_production_manager",
        article_id,
        "no open typeset tasks",
        format!("{} open tasks", production.open_tasks()),
      ));
    }
    article.production = None;
    event!(Level::WARN, article = %article_id, "Production assignment removed.");
    Ok(())
  }

  pub fn assign_typesetter(
    &self,
    article_id: ArticleId,
    typesetter: UserId,
    description: impl Into<String>,
    files: Vec<FileRef>,
    ctx: &NotificationContext,
  ) -> QuireResult<TypesetTaskId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = TypesetTaskId(self.store.allocate_id());
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.has_role(typesetter, Role::Typesetter, journal) {
        return Err(QuireError::MissingRole {
          user: typesetter,
          role: Role::Typesetter,
          journal,
        });
      }
      let production = article.production.as_mut().ok_or_else(|| {
        QuireError::precondition(
          "assign_typesetter",
          article_id,
          "a production assignment",
          "no production assignment",
        )
      })?;
      if production.closed.is_some() {
        return Err(QuireError::precondition(
          "assign_typesetter",
          article_id,
          "an open production assignment",
          "production already closed",
        ));
      }
      production.tasks.push(TypesetTask {
        id,
        typesetter,
        assigned: Utc::now(),
        notified: true,
        accepted: None,
        completed: None,
        cancelled: false,
        editor_reviewed: false,
        description: description.into(),
        files,
      });
      events.push(Event::TypesetTaskAssigned(TypesetPayload {
        article: article_id,
        task: id,
        typesetter,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  /// The typesetter accepts or declines the task. Declining closes it.
  pub fn typesetter_decision(
    &self,
    article_id: ArticleId,
    task_id: TypesetTaskId,
    typesetter: UserId,
    decision: TaskDecision,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let task = production_task_mut(&mut article, article_id, task_id)?;
      if task.typesetter != typesetter {
        return Err(QuireError::not_found("typeset task", task_id));
      }
      if task.status() != TaskStatus::Assigned {
        return Err(QuireError::precondition(
          "typesetter_decision",
          article_id,
          "a task awaiting a decision",
          task.status(),
        ));
      }
      let now = Utc::now();
      match decision {
        TaskDecision::Accepted => task.accepted = Some(now),
        TaskDecision::Declined => {
          task.accepted = None;
          task.completed = Some(now);
        }
      }
      events.push(Event::TypesetterDecision(TypesetPayload {
        article: article_id,
        task: task_id,
        typesetter,
        decision: Some(decision),
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Deletes a task the typesetter has not yet picked up.
  pub fn delete_task(
    &self,
    article_id: ArticleId,
    task_id: TypesetTaskId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let production = article.production.as_mut().ok_or_else(|| {
        QuireError::precondition(
          "delete_typeset_task",
          article_id,
          "a production assignment",
          "no production assignment",
        )
      })?;
      let index = production
        .tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| QuireError::not_found("typeset task", task_id))?;
      let task = &production.tasks[index];
      if task.status() != TaskStatus::Assigned {
        return Err(QuireError::precondition(
          "delete_typeset_task",
          article_id,
          "a task not yet actioned",
          task.status(),
        ));
      }
      let task = production.tasks.remove(index);
      events.push(Event::TypesetTaskDeleted(TypesetPayload {
        article: article_id,
        task: task_id,
        typesetter: task.typesetter,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn complete_task(
    &self,
    article_id: ArticleId,
    task_id: TypesetTaskId,
    typesetter: UserId,
    files: Vec<FileRef>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let task = production_task_mut(&mut article, article_id, task_id)?;
      if task.typesetter != typesetter {
        return Err(QuireError::not_found("typeset task", task_id));
      }
      if task.status() != TaskStatus::Accepted {
        return Err(QuireError::precondition(
          "complete_typeset_task",
          article_id,
          "an accepted typeset task",
          task.status(),
        ));
      }
      task.files.extend(files);
      task.completed = Some(Utc::now());
      events.push(Event::TypesetComplete(TypesetPayload {
        article: article_id,
        task: task_id,
        typesetter,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Closes production. Outstanding tasks are completed and flagged as
  /// editor-reviewed, and the workflow hands on to the next element.
  #[instrument(skip(self, ctx), fields(article = %article_id), err(Display))]
  pub fn production_done(
    &self,
    article_id: ArticleId,
    editor: UserId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
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
      let production = article.production.as_mut().ok_or_else(|| {
        QuireError::precondition(
          "production_done",
          article_id,
          "a production assignment",
          "no production assignment",
        )
      })?;
      if production.closed.is_some() {
        return Err(QuireError::precondition(
          "production_done",
          article_id,
          "an open production assignment",
          "production already closed",
        ));
      }
      let now = Utc::now();
      production.closed = Some(now);
      for task in production.tasks.iter_mut().filter(|t| t.is_open()) {
        task.completed = Some(now);
        task.editor_reviewed = true;
      }
      events.push(Event::ProductionComplete(ArticlePayload {
        article: article_id,
        ctx: ctx.clone(),
        message: None,
        skip: false,
      }));
      events.push(Event::WorkflowElementComplete(WorkflowPayload {
        article: article_id,
        element: WorkflowElement::Production,
        handshake_url: ctx.base_url.clone().unwrap_or_default(),
        switch_stage: true,
      }));
    }
    self.bus.raise_all(&events)
  }
}

fn production_task_mut<'a>(
  article: &'a mut crate::submission::Article,
  article_id: ArticleId,
  task_id: TypesetTaskId,
) -> QuireResult<&'a mut TypesetTask> {
  let production = article.production.as_mut().ok_or_else(|| {
    QuireError::precondition(
      "typeset_task",
      article_id,
      "a production assignment",
      "no production assignment",
    )
  })?;
  production
    .tasks
    .iter_mut()
    .find(|t| t.id == task_id)
    .ok_or_else(|| QuireError::not_found("typeset task", task_id))
}
