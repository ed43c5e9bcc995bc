//! Wave state machine per session.
//!
//! Waves order batches of subtasks. At most one wave per session runs at a
//! time: wave N starts only when every earlier wave is terminal. Counter
//! updates are atomic in the store, and terminal decisions are made from
//! the row the update returned.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BusEvent, EventName, WaveState, WaveStatus};
use crate::domain::ports::{TaskListRepository, WaveRepository};
use crate::gateway::channels::GLOBAL_CHANNEL;

pub struct WaveController {
    waves: Arc<dyn WaveRepository>,
    task_lists: Arc<dyn TaskListRepository>,
}

impl WaveController {
    pub fn new(waves: Arc<dyn WaveRepository>, task_lists: Arc<dyn TaskListRepository>) -> Self {
        Self { waves, task_lists }
    }

    /// Idempotent upsert of `(session, wave_number)` in pending status.
    pub async fn get_or_create_wave(
        &self,
        session_id: &str,
        wave_number: i32,
    ) -> DomainResult<WaveState> {
        validate_wave_number(wave_number)?;
        self.waves.get_or_create(session_id, wave_number).await
    }

    /// Transition pending -> running, gated on all earlier waves being
    /// terminal. Idempotent when the wave is already running.
    pub async fn start_wave(&self, session_id: &str, wave_number: i32) -> DomainResult<WaveState> {
        validate_wave_number(wave_number)?;

        if !self.waves.all_prior_terminal(session_id, wave_number).await? {
            return Err(DomainError::Conflict(format!(
                "cannot start wave {wave_number}: earlier waves are still open"
            )));
        }

        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            EventName::WaveTransitioned,
            serde_json::json!({
                "session_id": session_id,
                "from": wave_number - 1,
                "to": wave_number,
                "status": "running",
            }),
        )];
        self.waves.start(session_id, wave_number, &events).await
    }

    /// Count one task outcome against the wave. When the last counted task
    /// lands, the wave transitions to its terminal status and emits
    /// `wave.completed` or `wave.failed`.
    pub async fn complete_task(
        &self,
        session_id: &str,
        wave_number: i32,
        failed: bool,
    ) -> DomainResult<WaveState> {
        let wave = self
            .waves
            .increment_task(session_id, wave_number, failed)
            .await?;

        if !wave.is_exhausted() || wave.status.is_terminal() {
            return Ok(wave);
        }

        let status = if wave.failed_tasks > 0 {
            WaveStatus::Failed
        } else {
            WaveStatus::Completed
        };
        let completed_at = Utc::now();
        let duration_ms = wave
            .started_at
            .map(|started| (completed_at - started).num_milliseconds());

        let event_name = match status {
            WaveStatus::Failed => EventName::WaveFailed,
            _ => EventName::WaveCompleted,
        };
        let events = [BusEvent::new(
            GLOBAL_CHANNEL,
            event_name,
            serde_json::json!({
                "session_id": session_id,
                "wave_number": wave_number,
                "total_tasks": wave.total_tasks,
                "completed_tasks": wave.completed_tasks,
                "failed_tasks": wave.failed_tasks,
                "duration_ms": duration_ms,
            }),
        )];

        // None means a concurrent caller finalized first; their decision
        // used the same counters, so the incremented row is still accurate.
        match self
            .waves
            .finalize(session_id, wave_number, status, completed_at, &events)
            .await?
        {
            Some(finalized) => Ok(finalized),
            None => self
                .waves
                .get(session_id, wave_number)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found("wave_state", format!("{session_id}/{wave_number}"))
                }),
        }
    }

    /// Start the wave after the latest completed one, if it exists.
    pub async fn transition_to_next_wave(
        &self,
        session_id: &str,
    ) -> DomainResult<Option<WaveState>> {
        let Some(completed) = self.waves.latest_completed(session_id).await? else {
            return Ok(None);
        };
        let next = completed.wave_number + 1;
        if self.waves.get(session_id, next).await?.is_none() {
            return Ok(None);
        }
        self.start_wave(session_id, next).await.map(Some)
    }

    /// The running wave; if none, the latest pending wave; else None.
    pub async fn get_current_wave(&self, session_id: &str) -> DomainResult<Option<WaveState>> {
        self.waves.current(session_id).await
    }

    /// Batches submitted under this session, with their syntheses.
    pub async fn get_batches(
        &self,
        session_id: &str,
    ) -> DomainResult<Vec<crate::domain::models::OrchestrationBatch>> {
        self.waves.batches(session_id).await
    }

    /// All waves ordered by number. When no wave rows exist for the
    /// session, history is synthesized from task-list aggregates with the
    /// same counter semantics; synthesized rows are transient and never
    /// persisted.
    pub async fn get_wave_history(&self, session_id: &str) -> DomainResult<Vec<WaveState>> {
        let history = self.waves.history(session_id).await?;
        if !history.is_empty() {
            return Ok(history);
        }

        let aggregates = self.task_lists.session_wave_aggregates(session_id).await?;
        Ok(aggregates
            .into_iter()
            .map(|agg| {
                let exhausted =
                    agg.total_tasks > 0 && agg.completed_tasks + agg.failed_tasks >= agg.total_tasks;
                let status = if exhausted {
                    if agg.failed_tasks > 0 {
                        WaveStatus::Failed
                    } else {
                        WaveStatus::Completed
                    }
                } else if agg.earliest_started.is_some() {
                    WaveStatus::Running
                } else {
                    WaveStatus::Pending
                };
                WaveState {
                    id: Uuid::new_v4(),
                    session_id: session_id.to_string(),
                    wave_number: agg.wave_number,
                    total_tasks: agg.total_tasks,
                    completed_tasks: agg.completed_tasks,
                    failed_tasks: agg.failed_tasks,
                    status,
                    started_at: agg.earliest_started,
                    completed_at: exhausted.then_some(agg.latest_completed).flatten(),
                }
            })
            .collect())
    }
}

fn validate_wave_number(wave_number: i32) -> DomainResult<()> {
    if wave_number < 0 {
        return Err(DomainError::validation(
            "wave_number",
            "must be non-negative",
        ));
    }
    Ok(())
}
