use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::dto::{CreateTask, SelectTab, TaskView, ToggleAccepted, UpdateTask, ViewQuery};
use crate::error::{ApiResult, AppError};
use crate::routes::middleware_auth::JwtUser;
use crate::state::AppState;
use crate::tasks::filter::{visible, Tab, TabCounts, ViewState};
use crate::tasks::UserSession;

async fn render(session: &UserSession, view: &ViewState, tab: Option<Tab>) -> TaskView {
    let accessor = &session.accessor;
    let tasks = accessor.snapshot().await;
    let now = accessor.clock().now();

    let page = view.page(visible(&tasks, &now, tab));
    let counts = TabCounts::tally(&tasks, &now);

    TaskView::new(tab, page, counts, accessor.completing().await, accessor.is_loading())
}

pub async fn list(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Query(query): Query<ViewQuery>,
) -> Json<TaskView> {
    let session = state.sessions.open(user_id).await;
    let mut view = session.view.lock().await;

    let tab = match query.tab.as_deref().map(str::parse::<Tab>) {
        None => Some(view.tab()),
        Some(Ok(tab)) => {
            view.select(tab);
            Some(tab)
        }
        Some(Err(e)) => {
            tracing::warn!(user_id = %user_id, "{}, showing every task", e);
            None
        }
    };

    Json(render(&session, &view, tab).await)
}

pub async fn create(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Json(body): Json<CreateTask>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.open(user_id).await;
    let task = session.accessor.create(&body.title, body.due_date).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTask>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.open(user_id).await;
    let offset = *session.accessor.clock().now().offset();
    let task = session.accessor.update(id, body.into_patch(&offset)).await?;
    Ok(Json(task))
}

pub async fn delete(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.open(user_id).await;
    session.accessor.delete(id).await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

/// Starts a completion toggle and answers before the write lands.
pub async fn toggle(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let session = state.sessions.open(user_id).await;
    let task = session
        .accessor
        .find(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("task {} not found", id)))?;

    let accessor = session.accessor.clone();
    tokio::spawn(async move {
        match accessor.toggle_complete(task.id, task.completed).await {
            Ok(toggled) => {
                tracing::debug!(task_id = %toggled.id, is_complete = toggled.completed, "toggle applied");
            }
            Err(e) => {
                tracing::debug!(task_id = %task.id, "toggle not applied: {}", e);
            }
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ToggleAccepted {
            id,
            is_complete: !task.completed,
        }),
    ))
}

pub async fn select_tab(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Json(body): Json<SelectTab>,
) -> Json<TaskView> {
    let session = state.sessions.open(user_id).await;
    let mut view = session.view.lock().await;
    view.select(body.tab);
    Json(render(&session, &view, Some(body.tab)).await)
}

pub async fn show_more(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
) -> Json<TaskView> {
    let session = state.sessions.open(user_id).await;
    let mut view = session.view.lock().await;
    view.show_more();
    let tab = view.tab();
    Json(render(&session, &view, Some(tab)).await)
}
