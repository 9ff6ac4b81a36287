//! Boundary to the remote `tasks` table.
//!
//! Every backend exposes the same four row operations plus a change feed that
//! reports writes from any client, not only the caller's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::model::{NewTask, Task, TaskPatch};

/// Capacity of the change feed before slow subscribers start lagging.
pub const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "op")]
    pub kind: ChangeKind,
    #[serde(rename = "id")]
    pub task_id: Uuid,
    pub user_id: Uuid,
}

/// Row access to the `tasks` table.
///
/// `caller` on writes is the session identity the table's access policy is
/// checked against: a row that does not exist or is owned by someone else is
/// reported as [`StoreError::NotFound`].
#[async_trait]
pub trait TaskTable: Send + Sync {
    /// All rows owned by `owner`, oldest `created_at` first.
    async fn list_for_user(&self, owner: Uuid) -> Result<Vec<Task>, StoreError>;

    async fn insert(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn update(&self, caller: Uuid, id: Uuid, patch: TaskPatch) -> Result<Task, StoreError>;

    async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), StoreError>;

    /// Subscribes to every insert, update and delete on the table.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
