use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::model::{NewTask, Task, TaskPatch};
use super::table::{ChangeEvent, ChangeKind, StoreError, TaskTable, CHANGE_FEED_CAPACITY};

/// In-process `tasks` table with the same ordering, access policy and
/// change feed as [`super::pg::PgTaskTable`].
pub struct MemoryTaskTable {
    rows: RwLock<Vec<Task>>,
    changes: broadcast::Sender<ChangeEvent>,
    offline: AtomicBool,
}

impl Default for MemoryTaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTaskTable {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            rows: RwLock::new(Vec::new()),
            changes,
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every call fails as a transport error would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }

    fn notify(&self, kind: ChangeKind, task: &Task) {
        let _ = self.changes.send(ChangeEvent {
            kind,
            task_id: task.id,
            user_id: task.user_id,
        });
    }
}

#[async_trait]
impl TaskTable for MemoryTaskTable {
    async fn list_for_user(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        self.check_online()?;
        let rows = self.rows.read().await;
        let mut owned: Vec<Task> = rows.iter().filter(|t| t.user_id == owner).cloned().collect();
        // stable, so equal timestamps keep insertion order
        owned.sort_by_key(|t| t.created_at);
        Ok(owned)
    }

    async fn insert(&self, task: NewTask) -> Result<Task, StoreError> {
        self.check_online()?;
        let row = Task {
            id: Uuid::new_v4(),
            user_id: task.user_id,
            title: task.title,
            description: task.description,
            completed: false,
            created_at: Utc::now(),
            due_date: task.due_date,
        };
        self.rows.write().await.push(row.clone());
        self.notify(ChangeKind::Insert, &row);
        Ok(row)
    }

    async fn update(&self, caller: Uuid, id: Uuid, patch: TaskPatch) -> Result<Task, StoreError> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|t| t.id == id && t.user_id == caller)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(row);
        let row = row.clone();
        drop(rows);
        self.notify(ChangeKind::Update, &row);
        Ok(row)
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), StoreError> {
        self.check_online()?;
        let mut rows = self.rows.write().await;
        let index = rows
            .iter()
            .position(|t| t.id == id && t.user_id == caller)
            .ok_or(StoreError::NotFound(id))?;
        let row = rows.remove(index);
        drop(rows);
        self.notify(ChangeKind::Delete, &row);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(owner: Uuid, title: &str) -> NewTask {
        NewTask {
            user_id: owner,
            title: title.into(),
            description: String::new(),
            due_date: None,
        }
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_ordered() {
        let table = MemoryTaskTable::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        table.insert(new_task(alice, "first")).await.unwrap();
        table.insert(new_task(bob, "not mine")).await.unwrap();
        table.insert(new_task(alice, "second")).await.unwrap();

        let titles: Vec<String> = table
            .list_for_user(alice)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn writes_by_other_users_are_rejected() {
        let table = MemoryTaskTable::new();
        let alice = Uuid::new_v4();
        let task = table.insert(new_task(alice, "mine")).await.unwrap();

        let err = table
            .update(Uuid::new_v4(), task.id, TaskPatch::completed(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == task.id));

        let err = table.delete(Uuid::new_v4(), task.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(table.list_for_user(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_write_is_published() {
        let table = MemoryTaskTable::new();
        let mut feed = table.subscribe();
        let owner = Uuid::new_v4();

        let task = table.insert(new_task(owner, "a")).await.unwrap();
        table.update(owner, task.id, TaskPatch::completed(true)).await.unwrap();
        table.delete(owner, task.id).await.unwrap();

        let kinds = [
            feed.recv().await.unwrap().kind,
            feed.recv().await.unwrap().kind,
            feed.recv().await.unwrap().kind,
        ];
        assert_eq!(kinds, [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]);
    }

    #[tokio::test]
    async fn offline_table_fails_every_call() {
        let table = MemoryTaskTable::new();
        table.set_offline(true);

        let err = table.list_for_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
