//! Cleanup scheduler behavior with counting repository fakes.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use common::{EventLog, FakeMessageRepository};
use dcm::domain::errors::{DomainError, DomainResult};
use dcm::domain::models::config::CleanupConfig;
use dcm::domain::models::{
    ActiveAgent, AgentContext, AgentMessage, BusEvent, MessageTopic, Session, SessionStats,
    Subtask, SubtaskStatus,
};
use dcm::domain::ports::{
    ContextRepository, SessionRepository, SubtaskFilter, SubtaskRepository,
};
use dcm::services::CleanupScheduler;

/// Sessions fake: counts orphan closures, optionally failing.
#[derive(Default)]
struct CountingSessionRepository {
    closed: AtomicU64,
    fail: AtomicBool,
}

#[async_trait]
impl SessionRepository for CountingSessionRepository {
    async fn get_or_create(&self, id: &str, _events: &[BusEvent]) -> DomainResult<(Session, bool)> {
        Ok((Session::new(id), true))
    }

    async fn get(&self, _id: &str) -> DomainResult<Option<Session>> {
        Ok(None)
    }

    async fn list(&self, _active_only: bool) -> DomainResult<Vec<Session>> {
        Ok(Vec::new())
    }

    async fn end(&self, id: &str, _events: &[BusEvent]) -> DomainResult<Option<Session>> {
        Ok(Some(Session::new(id)))
    }

    async fn stats(&self) -> DomainResult<SessionStats> {
        Ok(SessionStats::default())
    }

    async fn close_orphaned(
        &self,
        _started_before: DateTime<Utc>,
        _inactive_since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        if self.fail.load(Ordering::Acquire) {
            return Err(DomainError::Database("connection reset".into()));
        }
        self.closed.fetch_add(2, Ordering::AcqRel);
        Ok(2)
    }

    async fn active_agents(&self) -> DomainResult<Vec<ActiveAgent>> {
        Ok(Vec::new())
    }
}

/// Contexts fake: counts stale and snapshot deletions separately.
#[derive(Default)]
struct CountingContextRepository {
    stale_calls: AtomicU64,
    snapshot_calls: AtomicU64,
}

#[async_trait]
impl ContextRepository for CountingContextRepository {
    async fn upsert(
        &self,
        context: &AgentContext,
        _events: &[BusEvent],
    ) -> DomainResult<AgentContext> {
        Ok(context.clone())
    }

    async fn get(&self, _project_id: Uuid, _agent_id: &str) -> DomainResult<Option<AgentContext>> {
        Ok(None)
    }

    async fn list_by_agent(&self, _agent_id: &str) -> DomainResult<Vec<AgentContext>> {
        Ok(Vec::new())
    }

    async fn latest_snapshot(&self, _session_id: &str) -> DomainResult<Option<AgentContext>> {
        Ok(None)
    }

    async fn delete_stale(
        &self,
        _updated_before: DateTime<Utc>,
        _active_since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.stale_calls.fetch_add(1, Ordering::AcqRel);
        Ok(1)
    }

    async fn delete_old_snapshots(&self, _updated_before: DateTime<Utc>) -> DomainResult<u64> {
        self.snapshot_calls.fetch_add(1, Ordering::AcqRel);
        Ok(3)
    }
}

/// Subtasks fake: counts stuck failures.
#[derive(Default)]
struct CountingSubtaskRepository {
    stuck_failed: AtomicU64,
}

#[async_trait]
impl SubtaskRepository for CountingSubtaskRepository {
    async fn create(&self, _subtask: &Subtask, _events: &[BusEvent]) -> DomainResult<()> {
        Ok(())
    }

    async fn get(&self, _id: Uuid) -> DomainResult<Option<Subtask>> {
        Ok(None)
    }

    async fn list(&self, _filter: SubtaskFilter) -> DomainResult<Vec<Subtask>> {
        Ok(Vec::new())
    }

    async fn sibling_ids(&self, _task_list_id: Uuid) -> DomainResult<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn update_status(
        &self,
        id: Uuid,
        _status: SubtaskStatus,
        _result: Option<serde_json::Value>,
        _agent_id: Option<String>,
        _events: &[BusEvent],
    ) -> DomainResult<Subtask> {
        Err(DomainError::not_found("subtask", id))
    }

    async fn delete(&self, id: Uuid, _events: &[BusEvent]) -> DomainResult<()> {
        Err(DomainError::not_found("subtask", id))
    }

    async fn close_session(
        &self,
        _session_id: &str,
        _result: serde_json::Value,
    ) -> DomainResult<Vec<Subtask>> {
        Ok(Vec::new())
    }

    async fn wave_coordinates(&self, _subtask_id: Uuid) -> DomainResult<Option<(String, i32)>> {
        Ok(None)
    }

    async fn fail_stuck(
        &self,
        _started_before: DateTime<Utc>,
        _inactive_since: DateTime<Utc>,
        result: serde_json::Value,
    ) -> DomainResult<u64> {
        assert_eq!(
            result["error"],
            "Timed out: no completion event received",
            "stuck subtasks must carry the timeout result"
        );
        self.stuck_failed.fetch_add(1, Ordering::AcqRel);
        Ok(1)
    }
}

struct Fixture {
    scheduler: Arc<CleanupScheduler>,
    messages: Arc<FakeMessageRepository>,
    sessions: Arc<CountingSessionRepository>,
    contexts: Arc<CountingContextRepository>,
}

fn fixture() -> Fixture {
    let log = Arc::new(EventLog::default());
    let messages = Arc::new(FakeMessageRepository::new(log));
    let sessions = Arc::new(CountingSessionRepository::default());
    let contexts = Arc::new(CountingContextRepository::default());
    let subtasks = Arc::new(CountingSubtaskRepository::default());
    let scheduler = Arc::new(CleanupScheduler::new(
        messages.clone(),
        sessions.clone(),
        contexts.clone(),
        subtasks,
        CleanupConfig::default(),
    ));
    Fixture {
        scheduler,
        messages,
        sessions,
        contexts,
    }
}

fn expired_message() -> AgentMessage {
    AgentMessage {
        id: Uuid::new_v4(),
        from_agent: "a".into(),
        to_agent: Some("b".into()),
        topic: MessageTopic::TaskCompleted,
        content: serde_json::json!({}),
        priority: 0,
        read_by: Vec::new(),
        created_at: Utc::now() - chrono::Duration::hours(2),
        expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
    }
}

#[tokio::test]
async fn tick_runs_every_task_and_records_stats() {
    let fixture = fixture();
    fixture.messages.rows.lock().await.push(expired_message());

    let stats = fixture.scheduler.run_once().await;
    assert_eq!(stats.deleted_messages, 1);
    assert_eq!(stats.closed_sessions, 2);
    assert_eq!(stats.deleted_agent_contexts, 1);
    assert_eq!(stats.failed_subtasks, 1);
    assert_eq!(stats.deleted_snapshots, 0, "snapshots only prune every 10th tick");
    assert!(stats.deleted_at.is_some());

    let latest = fixture.scheduler.latest_stats().await;
    assert_eq!(latest.closed_sessions, 2);
}

#[tokio::test]
async fn snapshots_prune_on_every_tenth_tick() {
    let fixture = fixture();
    for _ in 0..9 {
        let stats = fixture.scheduler.run_once().await;
        assert_eq!(stats.deleted_snapshots, 0);
    }
    let stats = fixture.scheduler.run_once().await;
    assert_eq!(stats.deleted_snapshots, 3);
    assert_eq!(fixture.contexts.snapshot_calls.load(Ordering::Acquire), 1);
}

#[tokio::test]
async fn one_failing_task_does_not_abort_the_tick() {
    let fixture = fixture();
    fixture.sessions.fail.store(true, Ordering::Release);
    fixture.messages.rows.lock().await.push(expired_message());

    let stats = fixture.scheduler.run_once().await;
    assert_eq!(stats.closed_sessions, 0, "failed task reports zero");
    assert_eq!(stats.deleted_messages, 1, "other tasks still ran");
    assert_eq!(stats.failed_subtasks, 1);
}

#[tokio::test]
async fn start_twice_is_a_noop_and_stop_is_safe() {
    let fixture = fixture();
    let (tx, rx) = tokio::sync::watch::channel(false);

    assert!(!fixture.scheduler.is_running());
    fixture.scheduler.stop();

    fixture.scheduler.clone().start(rx.clone());
    fixture.scheduler.clone().start(rx);
    assert!(fixture.scheduler.is_running());

    tx.send(true).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!fixture.scheduler.is_running());
}
