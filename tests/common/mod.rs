//! Shared in-memory fakes for service-level tests.
//!
//! These implement the repository ports over mutexed vectors so the domain
//! services can be exercised without a database. Event tuples passed to
//! mutating calls are captured for assertions.

// Each test binary uses a different subset of the fakes.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use dcm::domain::errors::{DomainError, DomainResult};
use dcm::domain::models::{
    AgentMessage, BusEvent, OrchestrationBatch, TaskList, TaskListStatus, WaveState, WaveStatus,
};
use dcm::domain::ports::{
    MessageFilter, MessageRepository, TaskListRepository, WaveAggregate, WaveRepository,
};

/// Captured event log shared by the fakes.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<BusEvent>>,
}

impl EventLog {
    pub async fn record(&self, events: &[BusEvent]) {
        self.events.lock().await.extend_from_slice(events);
    }

    pub async fn events_named(&self, name: &str) -> Vec<BusEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.event == name)
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<BusEvent> {
        self.events.lock().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeMessageRepository {
    pub rows: Mutex<Vec<AgentMessage>>,
    pub log: Arc<EventLog>,
}

impl FakeMessageRepository {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            log,
        }
    }
}

#[async_trait]
impl MessageRepository for FakeMessageRepository {
    async fn create(&self, message: &AgentMessage, events: &[BusEvent]) -> DomainResult<()> {
        self.rows.lock().await.push(message.clone());
        self.log.record(events).await;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentMessage>> {
        Ok(self.rows.lock().await.iter().find(|m| m.id == id).cloned())
    }

    async fn visible_to(
        &self,
        agent_id: &str,
        filter: MessageFilter,
    ) -> DomainResult<Vec<AgentMessage>> {
        let now = Utc::now();
        let mut messages: Vec<AgentMessage> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|m| m.is_live(now))
            .filter(|m| match &m.to_agent {
                Some(to) => to == agent_id,
                None => filter.include_broadcasts,
            })
            .filter(|m| filter.topic.is_none_or(|t| m.topic == t))
            .filter(|m| filter.since.is_none_or(|since| m.created_at >= since))
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(filter.limit as usize);
        Ok(messages)
    }

    async fn mark_read(
        &self,
        message_id: Uuid,
        agent_id: &str,
        events: &[BusEvent],
    ) -> DomainResult<bool> {
        let mut rows = self.rows.lock().await;
        let Some(message) = rows.iter_mut().find(|m| m.id == message_id) else {
            return Err(DomainError::not_found("message", message_id));
        };
        if message.read_by.iter().any(|a| a == agent_id) {
            return Ok(false);
        }
        message.read_by.push(agent_id.to_string());
        self.log.record(events).await;
        Ok(true)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|m| m.expires_at.is_none_or(|at| at >= now));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_read_broadcasts(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|m| {
            !(m.to_agent.is_none() && !m.read_by.is_empty() && m.created_at < cutoff)
        });
        Ok((before - rows.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Waves
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeWaveRepository {
    pub rows: Mutex<Vec<WaveState>>,
    pub log: Arc<EventLog>,
}

impl FakeWaveRepository {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            log,
        }
    }

    pub async fn set_total(&self, session_id: &str, wave_number: i32, total: i32) {
        let mut rows = self.rows.lock().await;
        if let Some(wave) = rows
            .iter_mut()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
        {
            wave.total_tasks = total;
        }
    }
}

#[async_trait]
impl WaveRepository for FakeWaveRepository {
    async fn get_or_create(&self, session_id: &str, wave_number: i32) -> DomainResult<WaveState> {
        let mut rows = self.rows.lock().await;
        if let Some(wave) = rows
            .iter()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
        {
            return Ok(wave.clone());
        }
        let wave = WaveState::new(session_id, wave_number);
        rows.push(wave.clone());
        Ok(wave)
    }

    async fn get(&self, session_id: &str, wave_number: i32) -> DomainResult<Option<WaveState>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
            .cloned())
    }

    async fn start(
        &self,
        session_id: &str,
        wave_number: i32,
        events: &[BusEvent],
    ) -> DomainResult<WaveState> {
        let mut rows = self.rows.lock().await;
        let Some(wave) = rows
            .iter_mut()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
        else {
            return Err(DomainError::not_found(
                "wave_state",
                format!("{session_id}/{wave_number}"),
            ));
        };
        match wave.status {
            WaveStatus::Pending => {
                wave.status = WaveStatus::Running;
                wave.started_at = Some(Utc::now());
                let snapshot = wave.clone();
                drop(rows);
                self.log.record(events).await;
                Ok(snapshot)
            }
            WaveStatus::Running => Ok(wave.clone()),
            _ => Err(DomainError::Conflict(format!(
                "wave {wave_number} is {}",
                wave.status.as_str()
            ))),
        }
    }

    async fn increment_task(
        &self,
        session_id: &str,
        wave_number: i32,
        failed: bool,
    ) -> DomainResult<WaveState> {
        let mut rows = self.rows.lock().await;
        let Some(wave) = rows
            .iter_mut()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
        else {
            return Err(DomainError::not_found(
                "wave_state",
                format!("{session_id}/{wave_number}"),
            ));
        };
        if failed {
            wave.failed_tasks += 1;
        } else {
            wave.completed_tasks += 1;
        }
        Ok(wave.clone())
    }

    async fn finalize(
        &self,
        session_id: &str,
        wave_number: i32,
        status: WaveStatus,
        completed_at: DateTime<Utc>,
        events: &[BusEvent],
    ) -> DomainResult<Option<WaveState>> {
        let mut rows = self.rows.lock().await;
        let Some(wave) = rows
            .iter_mut()
            .find(|w| w.session_id == session_id && w.wave_number == wave_number)
        else {
            return Ok(None);
        };
        if wave.status != WaveStatus::Running {
            return Ok(None);
        }
        wave.status = status;
        wave.completed_at = Some(completed_at);
        let snapshot = wave.clone();
        drop(rows);
        self.log.record(events).await;
        Ok(Some(snapshot))
    }

    async fn all_prior_terminal(&self, session_id: &str, wave_number: i32) -> DomainResult<bool> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|w| w.session_id == session_id && w.wave_number < wave_number)
            .all(|w| w.status.is_terminal()))
    }

    async fn latest_completed(&self, session_id: &str) -> DomainResult<Option<WaveState>> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|w| w.session_id == session_id && w.status == WaveStatus::Completed)
            .max_by_key(|w| w.wave_number)
            .cloned())
    }

    async fn current(&self, session_id: &str) -> DomainResult<Option<WaveState>> {
        let rows = self.rows.lock().await;
        let running = rows
            .iter()
            .find(|w| w.session_id == session_id && w.status == WaveStatus::Running);
        if let Some(wave) = running {
            return Ok(Some(wave.clone()));
        }
        Ok(rows
            .iter()
            .filter(|w| w.session_id == session_id && w.status == WaveStatus::Pending)
            .max_by_key(|w| w.wave_number)
            .cloned())
    }

    async fn history(&self, session_id: &str) -> DomainResult<Vec<WaveState>> {
        let mut waves: Vec<WaveState> = self
            .rows
            .lock()
            .await
            .iter()
            .filter(|w| w.session_id == session_id)
            .cloned()
            .collect();
        waves.sort_by_key(|w| w.wave_number);
        Ok(waves)
    }

    async fn batches(&self, _session_id: &str) -> DomainResult<Vec<OrchestrationBatch>> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Task lists (wave history fallback only)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTaskListRepository {
    pub aggregates: Mutex<Vec<WaveAggregate>>,
}

#[async_trait]
impl TaskListRepository for FakeTaskListRepository {
    async fn get_or_create(
        &self,
        task_list: &TaskList,
        _events: &[BusEvent],
    ) -> DomainResult<TaskList> {
        Ok(task_list.clone())
    }

    async fn get(&self, _id: Uuid) -> DomainResult<Option<TaskList>> {
        Ok(None)
    }

    async fn list_by_request(&self, _request_id: Uuid) -> DomainResult<Vec<TaskList>> {
        Ok(Vec::new())
    }

    async fn update_status(
        &self,
        id: Uuid,
        _status: TaskListStatus,
        _events: &[BusEvent],
    ) -> DomainResult<TaskList> {
        Err(DomainError::not_found("task_list", id))
    }

    async fn delete(&self, id: Uuid, _events: &[BusEvent]) -> DomainResult<()> {
        Err(DomainError::not_found("task_list", id))
    }

    async fn session_wave_aggregates(&self, _session_id: &str) -> DomainResult<Vec<WaveAggregate>> {
        Ok(self
            .aggregates
            .lock()
            .await
            .iter()
            .map(|a| WaveAggregate {
                wave_number: a.wave_number,
                total_tasks: a.total_tasks,
                completed_tasks: a.completed_tasks,
                failed_tasks: a.failed_tasks,
                earliest_started: a.earliest_started,
                latest_completed: a.latest_completed,
            })
            .collect())
    }
}
