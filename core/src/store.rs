// quire/src/store.rs

//! In-memory article store. Each article lives behind its own
//! `Arc<Mutex<_>>` so an operation takes exactly one lock, mutates, and
//! releases before any events are raised. A side index resolves review
//! assignment ids to their article, which keeps the reviewer access-code
//! path from scanning every article.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{event, Level};

use crate::error::{QuireError, QuireResult};
use crate::identity::UserId;
use crate::journal::JournalId;
use crate::review::ReviewAssignmentId;
use crate::submission::{Article, ArticleId};

pub struct ArticleStore {
  articles: RwLock<HashMap<ArticleId, Arc<Mutex<Article>>>>,
  review_assignments: RwLock<HashMap<ReviewAssignmentId, ArticleId>>,
  next_id: AtomicU64,
}

impl ArticleStore {
  pub fn new() -> Self {
    Self {
      articles: RwLock::new(HashMap::new()),
      review_assignments: RwLock::new(HashMap::new()),
      next_id: AtomicU64::new(1),
    }
  }

  /// Allocates the next id from a store-wide sequence. Ids are never
  /// reused, so references held by external systems stay stable.
  pub(crate) fn allocate_id(&self) -> u64 {
    self.next_id.fetch_add(1, Ordering::Relaxed)
  }

  pub fn create_article(&self, journal: JournalId, owner: UserId, title: &str) -> ArticleId {
    let id = ArticleId(self.allocate_id());
    let article = Article::new(id, journal, owner, title);
    self.articles.write().insert(id, Arc::new(Mutex::new(article)));
    event!(Level::DEBUG, article = %id, %journal, "Article created.");
    id
  }

  pub fn create_preprint(&self, journal: JournalId, owner: UserId, title: &str) -> ArticleId {
    let id = ArticleId(self.allocate_id());
    let article = Article::preprint(id, journal, owner, title);
    self.articles.write().insert(id, Arc::new(Mutex::new(article)));
    event!(Level::DEBUG, article = %id, %journal, "Preprint created.");
    id
  }

  pub fn article(&self, id: ArticleId) -> QuireResult<Arc<Mutex<Article>>> {
    self
      .articles
      .read()
      .get(&id)
      .cloned()
      .ok_or_else(|| QuireError::not_found("article", id))
  }

  pub(crate) fn index_review_assignment(&self, assignment: ReviewAssignmentId, article: ArticleId) {
    self.review_assignments.write().insert(assignment, article);
  }

  /// Resolves a review assignment id to its article. Unknown ids report
  /// the assignment, not the article, as missing.
  pub fn article_for_assignment(
    &self,
    assignment: ReviewAssignmentId,
  ) -> QuireResult<(ArticleId, Arc<Mutex<Article>>)> {
    let article_id = self
      .review_assignments
      .read()
      .get(&assignment)
      .copied()
      .ok_or_else(|| QuireError::not_found("review assignment", assignment))?;
    Ok((article_id, self.article(article_id)?))
  }
}

impl Default for ArticleStore {
  fn default() -> Self {
    Self::new()
  }
}
