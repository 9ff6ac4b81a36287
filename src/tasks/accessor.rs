//! Per-user synchronized view of the `tasks` table.
//!
//! The accessor never patches its local list. Every successful write, and
//! every change notification from the table, is followed by a full re-fetch
//! of the owner's rows. Re-fetches are not debounced or cancelled; whichever
//! resolves last wins.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::clock::Clock;
use super::model::{due_at_start_of_day, NewTask, Task, TaskPatch};
use super::table::{StoreError, TaskTable};

/// How long a task stays checked off on screen before the completion write.
pub const COMPLETION_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task title must not be blank")]
    BlankTitle,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TaskAccessor {
    table: Arc<dyn TaskTable>,
    owner: Uuid,
    clock: Arc<dyn Clock>,
    tasks: RwLock<Vec<Task>>,
    loading: AtomicBool,
    completing: Mutex<HashSet<Uuid>>,
}

impl TaskAccessor {
    pub fn new(table: Arc<dyn TaskTable>, owner: Uuid, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            owner,
            clock,
            tasks: RwLock::new(Vec::new()),
            loading: AtomicBool::new(true),
            completing: Mutex::new(HashSet::new()),
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// True until the first fetch has finished, successfully or not.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    pub async fn find(&self, id: Uuid) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| t.id == id).cloned()
    }

    /// Re-fetches the owner's tasks. On failure the previous list is kept.
    pub async fn refresh(&self) -> bool {
        let result = self.table.list_for_user(self.owner).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(tasks) => {
                tracing::debug!(owner = %self.owner, count = tasks.len(), "tasks refreshed");
                *self.tasks.write().await = tasks;
                true
            }
            Err(e) => {
                tracing::warn!(owner = %self.owner, "Error fetching tasks: {}", e);
                false
            }
        }
    }

    /// Re-fetches and returns the resulting list.
    pub async fn list(&self) -> Vec<Task> {
        self.refresh().await;
        self.snapshot().await
    }

    /// Creates an incomplete task, due at local midnight of `due` if given.
    pub async fn create(&self, title: &str, due: Option<NaiveDate>) -> Result<Task, TaskError> {
        if title.trim().is_empty() {
            return Err(TaskError::BlankTitle);
        }

        let offset = *self.clock.now().offset();
        let new_task = NewTask {
            user_id: self.owner,
            title: title.to_string(),
            description: String::new(),
            due_date: due.map(|date| due_at_start_of_day(date, &offset)),
        };

        let task = self.table.insert(new_task).await.map_err(|e| {
            tracing::error!(owner = %self.owner, "Error adding task: {}", e);
            e
        })?;
        tracing::info!(owner = %self.owner, task_id = %task.id, "task created");

        self.refresh().await;
        Ok(task)
    }

    /// Applies a partial update. Ownership is left to the table's policy.
    pub async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Task, TaskError> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(TaskError::BlankTitle);
        }

        let task = self.table.update(self.owner, id, patch).await.map_err(|e| {
            tracing::error!(owner = %self.owner, task_id = %id, "Error updating task: {}", e);
            e
        })?;

        self.refresh().await;
        Ok(task)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), TaskError> {
        self.table.delete(self.owner, id).await.map_err(|e| {
            tracing::error!(owner = %self.owner, task_id = %id, "Error deleting task: {}", e);
            e
        })?;
        tracing::info!(owner = %self.owner, task_id = %id, "task deleted");

        self.refresh().await;
        Ok(())
    }

    /// Flips the completed flag of a task whose current value is `completed`.
    ///
    /// Completing holds the id in the completing set for the completion delay
    /// before the write is sent. Reopening writes immediately.
    pub async fn toggle_complete(&self, id: Uuid, completed: bool) -> Result<Task, TaskError> {
        if !completed {
            self.completing.lock().await.insert(id);
            tokio::time::sleep(COMPLETION_DELAY).await;
            self.completing.lock().await.remove(&id);
        }

        self.update(id, TaskPatch::completed(!completed)).await
    }

    pub async fn is_completing(&self, id: Uuid) -> bool {
        self.completing.lock().await.contains(&id)
    }

    pub async fn completing(&self) -> Vec<Uuid> {
        self.completing.lock().await.iter().copied().collect()
    }

    /// Re-fetches on every change the table reports, whoever made it.
    pub fn watch(self: &Arc<Self>) -> JoinHandle<()> {
        let accessor = Arc::clone(self);
        let mut changes = self.table.subscribe();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        tracing::debug!(owner = %accessor.owner, task_id = %event.task_id, kind = ?event.kind, "change observed");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(owner = %accessor.owner, missed, "change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                accessor.refresh().await;
            }
        })
    }
}
