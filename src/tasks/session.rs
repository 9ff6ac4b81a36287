use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::accessor::TaskAccessor;
use super::clock::Clock;
use super::filter::ViewState;
use super::table::TaskTable;

/// Sessions untouched for this long are evicted by [`SessionRegistry::evict_idle`].
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One signed-in user's synchronized task list and view state.
pub struct UserSession {
    pub accessor: Arc<TaskAccessor>,
    pub view: Mutex<ViewState>,
    first_fetch: OnceCell<()>,
    last_seen: Mutex<Instant>,
    watcher: JoinHandle<()>,
}

impl UserSession {
    async fn touch(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_seen.lock().await.elapsed()
    }
}

impl Drop for UserSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    table: Arc<dyn TaskTable>,
    clock: Arc<dyn Clock>,
    idle_timeout: Duration,
    sessions: Arc<Mutex<HashMap<Uuid, Arc<UserSession>>>>,
}

impl SessionRegistry {
    pub fn new(table: Arc<dyn TaskTable>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            clock,
            idle_timeout: IDLE_TIMEOUT,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the user's session, opening it with a change subscription the
    /// first time. Callers for the same user wait for its first fetch; the
    /// registry lock is never held across it.
    pub async fn open(&self, user_id: Uuid) -> Arc<UserSession> {
        let session = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(&user_id) {
                Some(session) => Arc::clone(session),
                None => {
                    let session = self.new_session(user_id);
                    sessions.insert(user_id, Arc::clone(&session));
                    tracing::info!(user_id = %user_id, "session opened");
                    session
                }
            }
        };

        session.touch().await;
        session
            .first_fetch
            .get_or_init(|| async {
                session.accessor.refresh().await;
            })
            .await;

        session
    }

    fn new_session(&self, user_id: Uuid) -> Arc<UserSession> {
        let accessor = Arc::new(TaskAccessor::new(
            Arc::clone(&self.table),
            user_id,
            Arc::clone(&self.clock),
        ));
        let watcher = accessor.watch();

        Arc::new(UserSession {
            accessor,
            view: Mutex::new(ViewState::default()),
            first_fetch: OnceCell::new(),
            last_seen: Mutex::new(Instant::now()),
            watcher,
        })
    }

    /// Drops the user's session and its change subscription.
    pub async fn close(&self, user_id: Uuid) -> bool {
        let closed = self.sessions.lock().await.remove(&user_id);
        if let Some(session) = &closed {
            session.watcher.abort();
            tracing::info!(user_id = %user_id, "session closed");
        }
        closed.is_some()
    }

    /// Closes every session not opened within the idle timeout.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;

        let mut idle = Vec::new();
        for (user_id, session) in sessions.iter() {
            if session.idle_for().await >= self.idle_timeout {
                idle.push(*user_id);
            }
        }

        for user_id in &idle {
            if let Some(session) = sessions.remove(user_id) {
                session.watcher.abort();
                tracing::info!(user_id = %user_id, "idle session evicted");
            }
        }
        idle.len()
    }

    /// Runs [`Self::evict_idle`] every `every`.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            loop {
                ticks.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "session sweep");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::clock::SystemClock;
    use crate::tasks::memory::MemoryTaskTable;
    use crate::tasks::model::{NewTask, Task, TaskPatch};
    use crate::tasks::table::{ChangeEvent, StoreError};
    use async_trait::async_trait;
    use tokio::sync::broadcast;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryTaskTable::new()), Arc::new(SystemClock))
    }

    /// Table whose reads take `delay`.
    struct SlowTable {
        inner: MemoryTaskTable,
        delay: Duration,
    }

    #[async_trait]
    impl TaskTable for SlowTable {
        async fn list_for_user(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.list_for_user(owner).await
        }

        async fn insert(&self, task: NewTask) -> Result<Task, StoreError> {
            self.inner.insert(task).await
        }

        async fn update(&self, caller: Uuid, id: Uuid, patch: TaskPatch) -> Result<Task, StoreError> {
            self.inner.update(caller, id, patch).await
        }

        async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), StoreError> {
            self.inner.delete(caller, id).await
        }

        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn open_reuses_existing_session() {
        let registry = registry();
        let user = Uuid::new_v4();

        let first = registry.open(user).await;
        first.view.lock().await.show_more();
        let second = registry.open(user).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.accessor.is_loading());
        assert_eq!(second.view.lock().await.cap(), 10);
    }

    #[tokio::test]
    async fn close_forgets_session() {
        let registry = registry();
        let user = Uuid::new_v4();
        registry.open(user).await;

        assert!(registry.close(user).await);
        assert!(!registry.close(user).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_first_fetch_does_not_block_other_users() {
        let table = SlowTable {
            inner: MemoryTaskTable::new(),
            delay: Duration::from_secs(5),
        };
        let registry = SessionRegistry::new(Arc::new(table), Arc::new(SystemClock));

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.open(Uuid::new_v4()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = Instant::now();
        let count = tokio::time::timeout(Duration::from_millis(100), registry.len())
            .await
            .expect("registry lock held across a fetch");
        assert_eq!(count, 1);
        assert!(started.elapsed() < Duration::from_secs(1));

        let session = slow.await.unwrap();
        assert!(!session.accessor.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_open_waits_for_first_fetch() {
        let table = SlowTable {
            inner: MemoryTaskTable::new(),
            delay: Duration::from_secs(2),
        };
        let registry = SessionRegistry::new(Arc::new(table), Arc::new(SystemClock));
        let user = Uuid::new_v4();

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.open(user).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = registry.open(user).await;
        assert!(!second.accessor.is_loading());
        assert!(Arc::ptr_eq(&first.await.unwrap(), &second));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted() {
        let registry = registry().with_idle_timeout(Duration::from_secs(60));
        let idle_user = Uuid::new_v4();
        let active_user = Uuid::new_v4();

        let idle = registry.open(idle_user).await;
        registry.open(active_user).await;

        tokio::time::sleep(Duration::from_secs(40)).await;
        registry.open(active_user).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(idle.watcher.is_finished());

        let reopened = registry.open(idle_user).await;
        assert!(!Arc::ptr_eq(&idle, &reopened));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_in_background() {
        let registry = registry().with_idle_timeout(Duration::from_secs(60));
        registry.open(Uuid::new_v4()).await;

        let sweeper = registry.spawn_sweeper(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(75)).await;

        assert_eq!(registry.len().await, 0);
        sweeper.abort();
    }
}
