//! Postgres connection pool management.
//!
//! Transient connect failures retry with exponential backoff; terminal
//! errors (bad credentials, bad database) surface immediately.

use backoff::ExponentialBackoffBuilder;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub connect_retry_window: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(3),
            connect_retry_window: Duration::from_secs(30),
        }
    }
}

pub async fn create_pool(
    database: &DatabaseConfig,
    config: Option<PoolConfig>,
) -> Result<PgPool, ConnectionError> {
    let config = config.unwrap_or_default();

    let connect_options = PgConnectOptions::new()
        .host(&database.host)
        .port(database.port)
        .database(&database.name)
        .username(&database.user)
        .password(&database.password)
        .application_name("dcm");

    let retry_policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(5))
        .with_max_elapsed_time(Some(config.connect_retry_window))
        .build();

    let pool = backoff::future::retry(retry_policy, || async {
        PgPoolOptions::new()
            .max_connections(database.max_connections.max(1))
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(connect_options.clone())
            .await
            .map_err(|err| {
                if is_transient(&err) {
                    tracing::warn!("database connect failed, retrying: {err}");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
    })
    .await
    .map_err(ConnectionError::PoolCreationFailed)?;

    Ok(pool)
}

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
    )
}

/// Trivial round-trip health probe; returns latency in milliseconds.
pub async fn ping(pool: &PgPool) -> Result<u64, ConnectionError> {
    let start = std::time::Instant::now();
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(ConnectionError::ConnectionFailed)?;
    Ok(start.elapsed().as_millis() as u64)
}
