use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthData {
    status: u16,
    database: &'static str,
    sessions: usize,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthData>) {
    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    if !database_ok {
        tracing::warn!("health check: database unreachable");
    }

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let health_data = HealthData {
        status: status.as_u16(),
        database: if database_ok { "ok" } else { "unreachable" },
        sessions: state.sessions.len().await,
    };

    (status, Json(health_data))
}
