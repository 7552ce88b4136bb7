// quire/src/proofing.rs

//! The proofing chain. A proofing manager runs rounds of proofreading
//! tasks; a completed proof can spawn correction tasks back to a
//! typesetter. Both task kinds walk the same
//! assigned → accepted/declined → completed chain as production, with an
//! explicit cancelled escape hatch.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{event, instrument, Level};

use crate::error::{QuireError, QuireResult};
use crate::events::{
  ArticlePayload, CorrectionPayload, Event, EventBus, ManagerPayload, NotificationContext,
  ProofingPayload, WorkflowPayload,
};
use crate::files::FileRef;
use crate::identity::{Role, RoleDirectory, UserId};
use crate::production::{task_status, TaskDecision, TaskStatus};
use crate::store::ArticleStore;
use crate::submission::ArticleId;
use crate::workflow::WorkflowElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProofingTaskId(pub u64);

impl fmt::Display for ProofingTaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrectionTaskId(pub u64);

impl fmt::Display for CorrectionTaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Changes requested from a typesetter after a proof came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionTask {
  pub id: CorrectionTaskId,
  pub typesetter: UserId,
  pub assigned: DateTime<Utc>,
  pub due: Option<DateTime<Utc>>,
  pub accepted: Option<DateTime<Utc>>,
  pub completed: Option<DateTime<Utc>>,
  pub cancelled: bool,
  pub description: String,
  pub files: Vec<FileRef>,
}

impl CorrectionTask {
  pub fn status(&self) -> TaskStatus {
    task_status(self.cancelled, self.accepted, self.completed)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofingTask {
  pub id: ProofingTaskId,
  pub proofreader: UserId,
  pub assigned: DateTime<Utc>,
  pub due: Option<DateTime<Utc>>,
  pub accepted: Option<DateTime<Utc>>,
  pub completed: Option<DateTime<Utc>>,
  pub cancelled: bool,
  pub description: String,
  pub proofed_files: Vec<FileRef>,
  pub corrections: Vec<CorrectionTask>,
}

impl ProofingTask {
  pub fn status(&self) -> TaskStatus {
    task_status(self.cancelled, self.accepted, self.completed)
  }

  fn is_open(&self) -> bool {
    !self.cancelled && self.completed.is_none()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofingRound {
  pub number: u32,
  pub date_started: DateTime<Utc>,
  pub tasks: Vec<ProofingTask>,
}

impl ProofingRound {
  fn new(number: u32) -> Self {
    Self {
      number,
      date_started: Utc::now(),
      tasks: Vec::new(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofingAssignment {
  pub proofing_manager: UserId,
  pub editor: Option<UserId>,
  pub assigned: DateTime<Utc>,
  pub notified: bool,
  pub completed: Option<DateTime<Utc>>,
  pub rounds: Vec<ProofingRound>,
}

impl ProofingAssignment {
  pub fn current_round(&self) -> Option<&ProofingRound> {
    self.rounds.last()
  }

  fn task_mut(&mut self, id: ProofingTaskId) -> Option<&mut ProofingTask> {
    self
      .rounds
      .iter_mut()
      .flat_map(|round| round.tasks.iter_mut())
      .find(|t| t.id == id)
  }

  fn correction_mut(&mut self, id: CorrectionTaskId) -> Option<&mut CorrectionTask> {
    self
      .rounds
      .iter_mut()
      .flat_map(|round| round.tasks.iter_mut())
      .flat_map(|task| task.corrections.iter_mut())
      .find(|c| c.id == id)
  }
}

pub struct ProofingManager {
  store: Arc<ArticleStore>,
  bus: Arc<EventBus>,
  roles: Arc<dyn RoleDirectory>,
}

impl ProofingManager {
  pub fn new(store: Arc<ArticleStore>, bus: Arc<EventBus>, roles: Arc<dyn RoleDirectory>) -> Self {
    Self { store, bus, roles }
  }

  /// Puts a proofing manager on the article and opens round one.
  pub fn assign_manager(
    &self,
    article_id: ArticleId,
    manager: UserId,
    editor: Option<UserId>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.has_role(manager, Role::ProofingManager, journal) {
        return Err(QuireError::MissingRole {
          user: manager,
          role: Role::ProofingManager,
          journal,
        });
      }
      if article.proofing.is_some() {
        return Err(QuireError::precondition(
          "assign_proofing_manager",
          article_id,
          "no existing proofing assignment",
          "proofing manager already assigned",
        ));
      }
      article.proofing = Some(ProofingAssignment {
        proofing_manager: manager,
        editor,
        assigned: Utc::now(),
        notified: true,
        completed: None,
        rounds: vec![ProofingRound::new(1)],
      });
      events.push(Event::ProofingManagerAssigned(ManagerPayload {
        article: article_id,
        manager,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn add_round(&self, article_id: ArticleId) -> QuireResult<u32> {
    let handle = self.store.article(article_id)?;
    let mut article = handle.lock();
    let proofing = open_proofing_mut(&mut article, article_id, "add_proofing_round")?;
    let number = proofing.rounds.last().map_or(1, |r| r.number + 1);
    proofing.rounds.push(ProofingRound::new(number));
    event!(Level::INFO, article = %article_id, round = number, "Proofing round opened.");
    Ok(number)
  }

  pub fn assign_proofreader(
    &self,
    article_id: ArticleId,
    proofreader: UserId,
    description: impl Into<String>,
    due: Option<DateTime<Utc>>,
    ctx: &NotificationContext,
  ) -> QuireResult<ProofingTaskId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = ProofingTaskId(self.store.allocate_id());
    {
      let mut article = handle.lock();
      let journal = article.journal;
      if !self.roles.has_role(proofreader, Role::Proofreader, journal) {
        return Err(QuireError::MissingRole {
          user: proofreader,
          role: Role::Proofreader,
          journal,
        });
      }
      let proofing = open_proofing_mut(&mut article, article_id, "assign_proofreader")?;
      let round = proofing
        .rounds
        .last_mut()
        .ok_or_else(|| QuireError::not_found("proofing round", article_id))?;
      round.tasks.push(ProofingTask {
        id,
        proofreader,
        assigned: Utc::now(),
        due,
        accepted: None,
        completed: None,
        cancelled: false,
        description: description.into(),
        proofed_files: Vec::new(),
        corrections: Vec::new(),
      });
      events.push(Event::ProofingTaskAssigned(ProofingPayload {
        article: article_id,
        task: id,
        proofreader,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  pub fn proofreader_decision(
    &self,
    article_id: ArticleId,
    task_id: ProofingTaskId,
    proofreader: UserId,
    decision: TaskDecision,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let proofing = open_proofing_mut(&mut article, article_id, "proofreader_decision")?;
      let task = proofing
        .task_mut(task_id)
        .ok_or_else(|| QuireError::not_found("proofing task", task_id))?;
      if task.proofreader != proofreader {
        return Err(QuireError::not_found("proofing task", task_id));
      }
      if task.status() != TaskStatus::Assigned {
        return Err(QuireError::precondition(
          "proofreader_decision",
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
      events.push(Event::ProofreaderDecision(ProofingPayload {
        article: article_id,
        task: task_id,
        proofreader,
        decision: Some(decision),
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn complete_task(
    &self,
    article_id: ArticleId,
    task_id: ProofingTaskId,
    proofreader: UserId,
    proofed_files: Vec<FileRef>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let proofing = open_proofing_mut(&mut article, article_id, "complete_proofing_task")?;
      let task = proofing
        .task_mut(task_id)
        .ok_or_else(|| QuireError::not_found("proofing task", task_id))?;
      if task.proofreader != proofreader {
        return Err(QuireError::not_found("proofing task", task_id));
      }
      if task.status() != TaskStatus::Accepted {
        return Err(QuireError::precondition(
          "complete_proofing_task",
          article_id,
          "an accepted proofing task",
          task.status(),
        ));
      }
      task.proofed_files.extend(proofed_files);
      task.completed = Some(Utc::now());
      events.push(Event::ProofingTaskComplete(ProofingPayload {
        article: article_id,
        task: task_id,
        proofreader,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn cancel_task(
    &self,
    article_id: ArticleId,
    task_id: ProofingTaskId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let proofing = open_proofing_mut(&mut article, article_id, "cancel_proofing_task")?;
      let task = proofing
        .task_mut(task_id)
        .ok_or_else(|| QuireError::not_found("proofing task", task_id))?;
      if task.completed.is_some() {
        return Err(QuireError::precondition(
          "cancel_proofing_task",
          article_id,
          "an unfinished proofing task",
          task.status(),
        ));
      }
      task.cancelled = true;
      events.push(Event::ProofingTaskCancelled(ProofingPayload {
        article: article_id,
        task: task_id,
        proofreader: task.proofreader,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Spins a correction task off a completed proof, back to a typesetter.
  pub fn request_corrections(
    &self,
    article_id: ArticleId,
    task_id: ProofingTaskId,
    typesetter: UserId,
    description: impl Into<String>,
    due: Option<DateTime<Utc>>,
    ctx: &NotificationContext,
  ) -> QuireResult<CorrectionTaskId> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    let id = CorrectionTaskId(self.store.allocate_id());
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
      let proofing = open_proofing_mut(&mut article, article_id, "request_corrections")?;
      let task = proofing
        .task_mut(task_id)
        .ok_or_else(|| QuireError::not_found("proofing task", task_id))?;
      if task.status() != TaskStatus::Completed {
        return Err(QuireError::precondition(
          "request_corrections",
          article_id,
          "a completed proofing task",
          task.status(),
        ));
      }
      task.corrections.push(CorrectionTask {
        id,
        typesetter,
        assigned: Utc::now(),
        due,
        accepted: None,
        completed: None,
        cancelled: false,
        description: description.into(),
        files: Vec::new(),
      });
      events.push(Event::CorrectionsRequested(CorrectionPayload {
        article: article_id,
        correction: id,
        typesetter,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)?;
    Ok(id)
  }

  pub fn correction_decision(
    &self,
    article_id: ArticleId,
    correction_id: CorrectionTaskId,
    typesetter: UserId,
    decision: TaskDecision,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let proofing = open_proofing_mut(&mut article, article_id, "correction_decision")?;
      let correction = proofing
        .correction_mut(correction_id)
        .ok_or_else(|| QuireError::not_found("correction task", correction_id))?;
      if correction.typesetter != typesetter {
        return Err(QuireError::not_found("correction task", correction_id));
      }
      if correction.status() != TaskStatus::Assigned {
        return Err(QuireError::precondition(
          "correction_decision",
          article_id,
          "a task awaiting a decision",
          correction.status(),
        ));
      }
      let now = Utc::now();
      match decision {
        TaskDecision::Accepted => correction.accepted = Some(now),
        TaskDecision::Declined => {
          correction.accepted = None;
          correction.completed = Some(now);
        }
      }
      events.push(Event::CorrectionDecision(CorrectionPayload {
        article: article_id,
        correction: correction_id,
        typesetter,
        decision: Some(decision),
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  pub fn complete_correction(
    &self,
    article_id: ArticleId,
    correction_id: CorrectionTaskId,
    typesetter: UserId,
    files: Vec<FileRef>,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let proofing = open_proofing_mut(&mut article, article_id, "complete_correction")?;
      let correction = proofing
        .correction_mut(correction_id)
        .ok_or_else(|| QuireError::not_found("correction task", correction_id))?;
      if correction.typesetter != typesetter {
        return Err(QuireError::not_found("correction task", correction_id));
      }
      if correction.status() != TaskStatus::Accepted {
        return Err(QuireError::precondition(
          "complete_correction",
          article_id,
          "an accepted correction task",
          correction.status(),
        ));
      }
      correction.files.extend(files);
      correction.completed = Some(Utc::now());
      events.push(Event::CorrectionsComplete(CorrectionPayload {
        article: article_id,
        correction: correction_id,
        typesetter,
        decision: None,
        ctx: ctx.clone(),
      }));
    }
    self.bus.raise_all(&events)
  }

  /// Closes proofing. Whatever is still open gets cancelled, and the
  /// workflow hands on to the next element.
  #[instrument(skip(self, ctx), fields(article = %article_id), err(Display))]
  pub fn proofing_done(
    &self,
    article_id: ArticleId,
    actor: UserId,
    ctx: &NotificationContext,
  ) -> QuireResult<()> {
    let handle = self.store.article(article_id)?;
    let mut events = Vec::new();
    {
      let mut article = handle.lock();
      let journal = article.journal;
      let proofing = article.proofing.as_mut().ok_or_else(|| {
        QuireError::precondition(
          "proofing_done",
          article_id,
          "a proofing assignment",
          "no proofing assignment",
        )
      })?;
      if proofing.completed.is_some() {
        return Err(QuireError::precondition(
          "proofing_done",
          article_id,
          "an open proofing assignment",
          "proofing already complete",
        ));
      }
      if actor != proofing.proofing_manager && !self.roles.is_editor(actor, journal) {
        return Err(QuireError::NotAnEditor {
          user: actor,
          journal,
        });
      }
      let now = Utc::now();
      proofing.completed = Some(now);
      let mut cancelled = 0usize;
      for round in &mut proofing.rounds {
        for task in round.tasks.iter_mut().filter(|t| t.is_open()) {
          task.cancelled = true;
          cancelled += 1;
        }
      }
      if cancelled > 0 {
        event!(
          Level::WARN,
          article = %article_id,
          cancelled,
          "Open proofing tasks cancelled by proofing_done."
        );
      }
      events.push(Event::ProofingComplete(ArticlePayload {
        article: article_id,
        ctx: ctx.clone(),
        message: None,
        skip: false,
      }));
      events.push(Event::WorkflowElementComplete(WorkflowPayload {
        article: article_id,
        element: WorkflowElement::Proofing,
        handshake_url: ctx.base_url.clone().unwrap_or_default(),
        switch_stage: true,
      }));
    }
    self.bus.raise_all(&events)
  }
}

fn open_proofing_mut<'a>(
  article: &'a mut crate::submission::Article,
  article_id: ArticleId,
  operation: &'static str,
) -> QuireResult<&'a mut ProofingAssignment> {
  let proofing = article.proofing.as_mut().ok_or_else(|| {
    QuireError::precondition(operation, article_id, "a proofing assignment", "no proofing assignment")
  })?;
  if proofing.completed.is_some() {
    return Err(QuireError::precondition(
      operation,
      article_id,
      "an open proofing assignment",
      "proofing already complete",
    ));
  }
  Ok(proofing)
}
