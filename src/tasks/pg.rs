use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::model::{NewTask, Task, TaskPatch};
use super::table::{ChangeEvent, StoreError, TaskTable, CHANGE_FEED_CAPACITY};

/// Channel the `tasks` row trigger notifies on.
pub const CHANGE_CHANNEL: &str = "tasks_changes";

const COLUMNS: &str = "id, user_id, title, description, is_complete, created_at, due_date";

/// `id` breaks ties between rows created in the same instant, so repeated
/// reads come back in the same order.
fn list_for_user_sql() -> String {
    format!(
        r#"
        SELECT {COLUMNS}
        FROM tasks
        WHERE user_id = $1
        ORDER BY created_at ASC, id ASC
        "#
    )
}

pub struct PgTaskTable {
    pool: PgPool,
    changes: broadcast::Sender<ChangeEvent>,
    listener: JoinHandle<()>,
}

impl PgTaskTable {
    /// Starts listening for row notifications and returns the table handle.
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let listener = tokio::spawn(forward_notifications(listener, changes.clone()));

        Ok(Self {
            pool,
            changes,
            listener,
        })
    }
}

impl Drop for PgTaskTable {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn forward_notifications(mut listener: PgListener, changes: broadcast::Sender<ChangeEvent>) {
    loop {
        match listener.recv().await {
            Ok(notification) => match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                Ok(event) => {
                    tracing::debug!(task_id = %event.task_id, kind = ?event.kind, "task change");
                    // no subscribers is fine
                    let _ = changes.send(event);
                }
                Err(e) => {
                    tracing::warn!(payload = notification.payload(), "undecodable task change: {}", e);
                }
            },
            Err(e) => {
                tracing::error!("task change listener error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl TaskTable for PgTaskTable {
    async fn list_for_user(&self, owner: Uuid) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query_as::<_, Task>(&list_for_user_sql())
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn insert(&self, task: NewTask) -> Result<Task, StoreError> {
        let rec = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (user_id, title, description, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(rec)
    }

    async fn update(&self, caller: Uuid, id: Uuid, patch: TaskPatch) -> Result<Task, StoreError> {
        let rec = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                is_complete = COALESCE($5, is_complete),
                due_date = CASE WHEN $6 THEN $7 ELSE due_date END
            WHERE id = $2 AND user_id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(caller)
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.completed)
        .bind(patch.due_date.is_some())
        .bind(patch.due_date.flatten())
        .fetch_optional(&self.pool)
        .await?;

        rec.ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(caller)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_order_is_total() {
        let sql = list_for_user_sql();
        assert!(sql.contains("WHERE user_id = $1"));
        assert!(sql.trim_end().ends_with("ORDER BY created_at ASC, id ASC"));
    }
}
