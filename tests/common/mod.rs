use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{FixedOffset, TimeZone};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use taskflow::routes::{self, auth::issue_token};
use taskflow::state::AppState;
use taskflow::tasks::{FixedClock, MemoryTaskTable};

pub const SECRET: &str = "test-secret-test-secret-test-secret";

/// Router over an in-memory task table with a clock pinned to
/// 2024-03-15 10:00 UTC.
pub struct TestContext {
    pub app: Router,
    pub table: Arc<MemoryTaskTable>,
    pub user_id: Uuid,
    pub token: String,
}

impl TestContext {
    pub fn new() -> Self {
        // never connected: the task routes do not touch the pool
        let db = PgPoolOptions::new()
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy("postgres://taskflow@localhost/taskflow")
            .unwrap();
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 10, 0, 0)
            .unwrap();
        let table = Arc::new(MemoryTaskTable::new());
        let state = AppState::new(db, table.clone(), Arc::new(FixedClock(now)), SECRET);

        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, SECRET).unwrap();

        Self {
            app: routes::routes(state),
            table,
            user_id,
            token,
        }
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        issue_token(user_id, SECRET).unwrap()
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_as(&self.token, method, uri, body).await
    }

    pub async fn send_as(
        &self,
        token: &str,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn create(&self, title: &str, due_date: Option<&str>) -> Value {
        let (status, task) = self
            .send(
                "POST",
                "/api/tasks",
                Some(serde_json::json!({ "title": title, "due_date": due_date })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", task);
        task
    }
}

pub fn titles(view: &Value) -> Vec<String> {
    view["tasks"]
        .as_array()
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(|t| t["title"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
