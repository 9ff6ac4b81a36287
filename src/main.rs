use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskflow::config::Config;
use taskflow::routes;
use taskflow::state::AppState;
use taskflow::tasks::{PgTaskTable, SystemClock};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Error connecting DB")?;

    sqlx::migrate!().run(&db).await.context("Error running migrations")?;

    let tasks = PgTaskTable::connect(db.clone())
        .await
        .context("Error subscribing to task changes")?;

    let state = AppState::new(db, Arc::new(tasks), Arc::new(SystemClock), &config.jwt_secret)
        .with_session_idle_timeout(Duration::from_secs(config.session_idle_timeout_secs));
    state.sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL);

    let app = routes::routes(state);

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;

    tracing::info!("server is chilling at http://{}", config.addr());

    axum::serve(listener, app).await?;

    Ok(())
}
