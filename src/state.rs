use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::tasks::{Clock, SessionRegistry, TaskTable};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub sessions: SessionRegistry,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(db: PgPool, tasks: Arc<dyn TaskTable>, clock: Arc<dyn Clock>, jwt_secret: &str) -> Self {
        Self {
            db,
            sessions: SessionRegistry::new(tasks, clock),
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    pub fn with_session_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.sessions = self.sessions.with_idle_timeout(idle_timeout);
        self
    }
}
