//! Service configuration, loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address, e.g. "0.0.0.0:8081"
    pub bind_address: String,

    /// `PostgreSQL` connection URL
    pub database_url: String,

    /// Pool size (default: 10)
    pub database_max_connections: u32,

    /// Largest accepted request body in bytes (default: 1 MiB)
    pub max_body_bytes: usize,

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Config {
    /// Load configuration from the environment. Call `dotenvy::dotenv()` first
    /// to pick up a local `.env`.
    pub fn from_env() -> Result<Self> {
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(addr) => addr,
            Err(_) => {
                let port: u16 = env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8081);
                format!("0.0.0.0:{port}")
            }
        };

        Ok(Self {
            bind_address,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024 * 1024),
            log_filter: env::var("RUST_LOG")
                .unwrap_or_else(|_| "course_quiz=info,tower_http=info,axum=info".into()),
        })
    }

    /// Configuration for tests. Postgres-backed tests expect
    /// `postgres://localhost/course_quiz_test` unless `DATABASE_URL` says otherwise.
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:0".into(),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/course_quiz_test".into()),
            database_max_connections: 5,
            max_body_bytes: 1024 * 1024,
            log_filter: "course_quiz=debug".into(),
        }
    }
}
