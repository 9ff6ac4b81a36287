use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

/// Process configuration, read from the environment (and `.env` if present).
///
/// - `HOST`: bind address, default `127.0.0.1`
/// - `PORT`: required
/// - `DATABASE_URL`: required
/// - `DATABASE_MAX_CONNECTIONS`: default `10`
/// - `JWT_SECRET`: required, at least 32 characters
/// - `SESSION_IDLE_TIMEOUT_SECS`: default `1800`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub session_idle_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenv().is_ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .context("PORT missing, it is required")?
            .parse::<u16>()
            .context("PORT must be a valid u16 number")?;

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL missing, it is required")?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a number")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET missing, it is required")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let session_idle_timeout_secs = env::var("SESSION_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse::<u64>()
            .context("SESSION_IDLE_TIMEOUT_SECS must be a number")?;

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            jwt_secret,
            session_idle_timeout_secs,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
