//! Wave state repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{BusEvent, OrchestrationBatch, WaveState, WaveStatus};

/// Repository interface for WaveState persistence.
///
/// Counter updates and status transitions are single atomic statements
/// (`UPDATE .. RETURNING`); concurrent callers are serialized by row-level
/// locking and decisions are made from the returned row.
#[async_trait]
pub trait WaveRepository: Send + Sync {
    /// Upsert `(session, wave_number)` with pending status and zero
    /// counters. Idempotent: an existing row is returned unchanged.
    async fn get_or_create(&self, session_id: &str, wave_number: i32) -> DomainResult<WaveState>;

    async fn get(&self, session_id: &str, wave_number: i32) -> DomainResult<Option<WaveState>>;

    /// Transition pending -> running and set `started_at`. Idempotent when
    /// already running. Returns the row after the attempt.
    async fn start(
        &self,
        session_id: &str,
        wave_number: i32,
        events: &[BusEvent],
    ) -> DomainResult<WaveState>;

    /// Atomically increment the completed or failed counter, returning the
    /// updated row for the caller's terminal decision.
    async fn increment_task(
        &self,
        session_id: &str,
        wave_number: i32,
        failed: bool,
    ) -> DomainResult<WaveState>;

    /// Transition running -> terminal status and set `completed_at`. Gated
    /// on the row still being running; returns None when another caller
    /// already finalized it.
    async fn finalize(
        &self,
        session_id: &str,
        wave_number: i32,
        status: WaveStatus,
        completed_at: DateTime<Utc>,
        events: &[BusEvent],
    ) -> DomainResult<Option<WaveState>>;

    /// True iff every wave with a lower number is in a terminal status.
    async fn all_prior_terminal(&self, session_id: &str, wave_number: i32) -> DomainResult<bool>;

    /// Highest-numbered completed wave, if any.
    async fn latest_completed(&self, session_id: &str) -> DomainResult<Option<WaveState>>;

    /// The running wave; if none, the latest pending wave; else None.
    async fn current(&self, session_id: &str) -> DomainResult<Option<WaveState>>;

    /// All waves for the session ordered by wave number.
    async fn history(&self, session_id: &str) -> DomainResult<Vec<WaveState>>;

    /// Orchestration batches for the session, wave order. Batches close
    /// (completed_at + synthesis) when their wave finalizes.
    async fn batches(&self, session_id: &str) -> DomainResult<Vec<OrchestrationBatch>>;
}
