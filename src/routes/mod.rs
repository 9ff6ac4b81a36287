use axum::{
    extract::State,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub mod auth;
pub mod health;
pub mod middleware_auth;
pub mod tasks;

pub use auth::{login, register};
pub use health::health;

use crate::state::AppState;
use middleware_auth::JwtUser;

pub fn routes(state: AppState) -> Router {
    let task_router = Router::new()
        .route("/", post(tasks::routes::create).get(tasks::routes::list))
        .route("/view", put(tasks::routes::select_tab))
        .route("/view/more", post(tasks::routes::show_more))
        .route(
            "/{id}",
            put(tasks::routes::update).delete(tasks::routes::delete),
        )
        .route("/{id}/toggle", post(tasks::routes::toggle));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .nest(
            "/api",
            Router::new()
                .route("/me", get(me_handler))
                .route("/logout", post(logout))
                .nest("/tasks", task_router)
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    middleware_auth::require_auth,
                )),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "TaskFlow API"
}

#[derive(Serialize)]
struct Me {
    user_id: Uuid,
}

async fn me_handler(JwtUser(user_id): JwtUser) -> Json<Me> {
    Json(Me { user_id })
}

async fn logout(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
) -> Json<serde_json::Value> {
    let closed = state.sessions.close(user_id).await;
    Json(serde_json::json!({ "signed_out": closed }))
}
