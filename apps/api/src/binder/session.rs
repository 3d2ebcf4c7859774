//! Binder sessions — the local selection list each school/grade edits against.
//!
//! # Consistency model
//! - The session's list is the truth. Plans are computed under the session lock and applied
//!   immediately.
//! - The matching store writes are queued to a per-session writer task and applied in order.
//!   A failed write is logged and kept as a notice for the user; the local list is not
//!   rolled back.
//! - `refresh` drains the queue, refetches from the store and replaces the local list.
//! - Idle sessions with no pending notices are evicted; dropping a session closes its queue
//!   and the writer exits once the queued writes are applied.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::binder::store::SelectionStore;
use crate::errors::AppError;
use crate::layout::{
    plan_selection, remove_selection, swap_half_page_order, PlacementRequest, Removal, Selection,
    SelectionPlan, SlotPosition,
};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Identifies one binder: a school's selection for one grade.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinderKey {
    pub school_id: Uuid,
    pub grade: String,
}

impl BinderKey {
    pub fn new(school_id: Uuid, grade: impl Into<String>) -> Self {
        Self {
            school_id,
            grade: grade.into(),
        }
    }
}

/// A user-facing message about a store write that did not go through.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
enum WriteOp {
    Save(Selection),
    Remove {
        page_index: i32,
        position: Option<SlotPosition>,
    },
    Flush(oneshot::Sender<()>),
}

struct BinderSession {
    selections: Vec<Selection>,
    notices: Arc<Mutex<Vec<Notice>>>,
    writer: mpsc::UnboundedSender<WriteOp>,
}

impl BinderSession {
    fn enqueue(&self, op: WriteOp) {
        if let Err(e) = self.writer.send(op) {
            warn!("Selection writer is gone, dropping {:?}", e.0);
        }
    }
}

type SharedSession = Arc<Mutex<BinderSession>>;

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionRegistry {
    store: Arc<dyn SelectionStore>,
    sessions: Mutex<HashMap<BinderKey, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SelectionStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Current local selection list.
    pub async fn selections(&self, key: &BinderKey) -> Result<Vec<Selection>, AppError> {
        let session = self.session(key).await?;
        let guard = session.lock().await;
        Ok(guard.selections.clone())
    }

    /// Plans and applies a placement. On error nothing changes, locally or remotely.
    pub async fn place(
        &self,
        key: &BinderKey,
        request: &PlacementRequest,
    ) -> Result<SelectionPlan, AppError> {
        let session = self.session(key).await?;
        let mut guard = session.lock().await;

        let plan = plan_selection(&guard.selections, request)?;

        for removed in &plan.removed {
            guard.enqueue(WriteOp::Remove {
                page_index: removed.page_index,
                position: removed.position,
            });
        }
        guard.enqueue(WriteOp::Save(plan.placed.clone()));
        guard.selections = plan.selections.clone();

        info!(
            "Placed '{}' on page {} of {}/{} (replacement={})",
            plan.placed.code, plan.placed.page_index, key.school_id, key.grade, plan.is_replacement
        );
        Ok(plan)
    }

    /// Removes what occupies `page_index` (optionally only one slot).
    pub async fn remove(
        &self,
        key: &BinderKey,
        page_index: i32,
        position: Option<SlotPosition>,
    ) -> Result<Removal, AppError> {
        let session = self.session(key).await?;
        let mut guard = session.lock().await;

        let removal = remove_selection(&guard.selections, page_index, position);
        if removal.removed.is_empty() {
            return Err(AppError::NotFound(format!(
                "Nothing to remove on page {page_index}"
            )));
        }

        for removed in &removal.removed {
            guard.enqueue(WriteOp::Remove {
                page_index: removed.page_index,
                position: removed.position,
            });
        }
        guard.selections = removal.selections.clone();

        info!(
            "Removed {} selection(s) from page {page_index} of {}/{}",
            removal.removed.len(),
            key.school_id,
            key.grade
        );
        Ok(removal)
    }

    /// Swaps the two half-page rhymes on `page_index`.
    pub async fn swap(&self, key: &BinderKey, page_index: i32) -> Result<Vec<Selection>, AppError> {
        let session = self.session(key).await?;
        let mut guard = session.lock().await;

        let swapped = swap_half_page_order(&guard.selections, page_index)?;
        for sel in swapped.iter().filter(|s| s.page_index == page_index) {
            guard.enqueue(WriteOp::Save(sel.clone()));
        }
        guard.selections = swapped.clone();
        Ok(swapped)
    }

    /// Waits for queued writes, then replaces the local list with the store's view.
    pub async fn refresh(&self, key: &BinderKey) -> Result<Vec<Selection>, AppError> {
        let session = self.session(key).await?;
        let mut guard = session.lock().await;

        let (done_tx, done_rx) = oneshot::channel();
        guard.enqueue(WriteOp::Flush(done_tx));
        if done_rx.await.is_err() {
            warn!("Selection writer for {}/{} stopped before flush", key.school_id, key.grade);
        }

        guard.selections = self.store.fetch(key.school_id, &key.grade).await?;
        Ok(guard.selections.clone())
    }

    /// Returns and clears the pending notices.
    pub async fn drain_notices(&self, key: &BinderKey) -> Result<Vec<Notice>, AppError> {
        let session = self.session(key).await?;
        let notices = Arc::clone(&session.lock().await.notices);
        let drained = std::mem::take(&mut *notices.lock().await);
        Ok(drained)
    }

    /// Drops sessions unused for `idle_for` that nobody holds and that have no undelivered
    /// notices. Returns how many were evicted.
    pub async fn evict_idle(&self, idle_for: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|key, entry| {
            if entry.last_used.elapsed() < idle_for || Arc::strong_count(&entry.session) > 1 {
                return true;
            }
            let has_notices = match entry.session.try_lock() {
                Ok(guard) => match guard.notices.try_lock() {
                    Ok(notices) => !notices.is_empty(),
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if !has_notices {
                debug!("Evicting idle binder session {}/{}", key.school_id, key.grade);
            }
            has_notices
        });
        before - sessions.len()
    }

    /// Number of open sessions.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn session(&self, key: &BinderKey) -> Result<SharedSession, AppError> {
        if let Some(entry) = self.sessions.lock().await.get_mut(key) {
            entry.last_used = Instant::now();
            return Ok(Arc::clone(&entry.session));
        }

        // Fetched outside the registry lock; another request may insert first.
        let selections = self.store.fetch(key.school_id, &key.grade).await?;

        let mut sessions = self.sessions.lock().await;
        let entry = match sessions.entry(key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let notices = Arc::new(Mutex::new(Vec::new()));
                let (writer, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_writer(
                    Arc::clone(&self.store),
                    key.clone(),
                    Arc::clone(&notices),
                    rx,
                ));

                info!(
                    "Opened binder session {}/{} with {} selection(s)",
                    key.school_id,
                    key.grade,
                    selections.len()
                );
                slot.insert(SessionEntry {
                    session: Arc::new(Mutex::new(BinderSession {
                        selections,
                        notices,
                        writer,
                    })),
                    last_used: Instant::now(),
                })
            }
        };
        entry.last_used = Instant::now();
        Ok(Arc::clone(&entry.session))
    }
}

/// Applies queued writes in order until the session's sender is dropped.
async fn run_writer(
    store: Arc<dyn SelectionStore>,
    key: BinderKey,
    notices: Arc<Mutex<Vec<Notice>>>,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
) {
    while let Some(op) = rx.recv().await {
        let (result, what) = match op {
            WriteOp::Save(sel) => (
                store.save(key.school_id, &key.grade, &sel).await,
                format!("save '{}' on page {}", sel.code, sel.page_index + 1),
            ),
            WriteOp::Remove {
                page_index,
                position,
            } => (
                store
                    .remove(key.school_id, &key.grade, page_index, position)
                    .await,
                format!("remove the rhyme on page {}", page_index + 1),
            ),
            WriteOp::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        if let Err(e) = result {
            warn!(
                "Selection write for {}/{} failed: {what}: {e}",
                key.school_id, key.grade
            );
            notices.lock().await.push(Notice {
                message: format!("Could not {what}. Your change is kept locally; please retry."),
                created_at: Utc::now(),
            });
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
