//! NOTIFY helpers.
//!
//! Every write-path helper that mutates a user-visible entity sends its
//! `{channel, event, data}` payload through `pg_notify` **inside the same
//! transaction as the write**, so commit ordering and notify ordering
//! coincide and rolled-back writes are never observed.

use sqlx::{PgConnection, Postgres, Transaction};

use crate::domain::errors::DomainResult;
use crate::domain::models::BusEvent;

/// The single Postgres NOTIFY channel all events travel on.
pub const NOTIFY_CHANNEL: &str = "dcm_events";

/// Send one event envelope on `dcm_events` using the given connection
/// (normally a transaction's connection).
pub async fn notify_event(conn: &mut PgConnection, event: &BusEvent) -> DomainResult<()> {
    let payload = serde_json::to_string(event)?;
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(NOTIFY_CHANNEL)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}

/// Send every event in order within the transaction.
pub async fn notify_all(
    tx: &mut Transaction<'_, Postgres>,
    events: &[BusEvent],
) -> DomainResult<()> {
    for event in events {
        notify_event(&mut **tx, event).await?;
    }
    Ok(())
}
