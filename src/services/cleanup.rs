//! Periodic cleanup scheduler.
//!
//! Every tick runs six idempotent pruning tasks concurrently: expired
//! messages, orphaned sessions, stale agent contexts, stuck subtasks, old
//! compact snapshots (every ~10th tick) and old read broadcasts. A failing
//! task is logged and never aborts the tick.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::interval;

use crate::domain::errors::DomainResult;
use crate::domain::models::config::CleanupConfig;
use crate::domain::ports::{
    ContextRepository, MessageRepository, SessionRepository, SubtaskRepository,
};

/// Ticks between compact-snapshot pruning runs.
const SNAPSHOT_PRUNE_EVERY: u64 = 10;

/// Result message written into subtasks failed by the stuck sweep.
const STUCK_RESULT: &str = "Timed out: no completion event received";

/// Outcome of the most recent tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupStats {
    pub deleted_messages: u64,
    pub closed_sessions: u64,
    pub deleted_agent_contexts: u64,
    pub failed_subtasks: u64,
    pub deleted_snapshots: u64,
    pub deleted_read_broadcasts: u64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

pub struct CleanupScheduler {
    messages: Arc<dyn MessageRepository>,
    sessions: Arc<dyn SessionRepository>,
    contexts: Arc<dyn ContextRepository>,
    subtasks: Arc<dyn SubtaskRepository>,
    config: CleanupConfig,
    stats: Arc<RwLock<CleanupStats>>,
    running: Arc<AtomicBool>,
    tick_count: AtomicU64,
}

impl CleanupScheduler {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        sessions: Arc<dyn SessionRepository>,
        contexts: Arc<dyn ContextRepository>,
        subtasks: Arc<dyn SubtaskRepository>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            messages,
            sessions,
            contexts,
            subtasks,
            config,
            stats: Arc::new(RwLock::new(CleanupStats::default())),
            running: Arc::new(AtomicBool::new(false)),
            tick_count: AtomicU64::new(0),
        }
    }

    /// Spawn the periodic driver. Starting twice is a no-op.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::debug!("cleanup scheduler already running");
            return;
        }

        let scheduler = self;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(scheduler.config.interval_ms.max(1)));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        scheduler.run_once().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            scheduler.running.store(false, Ordering::Release);
            tracing::info!("cleanup scheduler stopped");
        });
    }

    /// Stop is driven by the shutdown signal; calling this when nothing is
    /// running is safe.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One full tick. Also the manual `dcm cleanup` entry point.
    pub async fn run_once(&self) -> CleanupStats {
        let tick = self.tick_count.fetch_add(1, Ordering::AcqRel) + 1;
        let started = std::time::Instant::now();
        let now = Utc::now();

        let stale_cutoff = now
            - ChronoDuration::seconds((self.config.stale_threshold_hours * 3600.0) as i64);
        let inactive_cutoff = now - ChronoDuration::minutes(self.config.inactive_minutes);
        let snapshot_cutoff = now - ChronoDuration::hours(self.config.snapshot_max_age_hours);
        let broadcast_cutoff = now - ChronoDuration::hours(self.config.read_message_max_age_hours);

        let prune_snapshots = tick % SNAPSHOT_PRUNE_EVERY == 0;

        let (messages, sessions, contexts, subtasks, snapshots, broadcasts) = tokio::join!(
            self.messages.delete_expired(now),
            self.sessions.close_orphaned(stale_cutoff, inactive_cutoff),
            self.contexts.delete_stale(stale_cutoff, inactive_cutoff),
            self.subtasks.fail_stuck(
                stale_cutoff,
                inactive_cutoff,
                serde_json::json!({ "error": STUCK_RESULT }),
            ),
            async {
                if prune_snapshots {
                    self.contexts.delete_old_snapshots(snapshot_cutoff).await
                } else {
                    Ok(0)
                }
            },
            self.messages.delete_read_broadcasts(broadcast_cutoff),
        );

        let stats = CleanupStats {
            deleted_messages: count_or_log("expired messages", messages),
            closed_sessions: count_or_log("orphaned sessions", sessions),
            deleted_agent_contexts: count_or_log("stale contexts", contexts),
            failed_subtasks: count_or_log("stuck subtasks", subtasks),
            deleted_snapshots: count_or_log("old snapshots", snapshots),
            deleted_read_broadcasts: count_or_log("read broadcasts", broadcasts),
            deleted_at: Some(now),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if stats.deleted_messages
            + stats.closed_sessions
            + stats.deleted_agent_contexts
            + stats.failed_subtasks
            + stats.deleted_snapshots
            + stats.deleted_read_broadcasts
            > 0
        {
            tracing::info!(?stats, "cleanup tick pruned rows");
        }

        *self.stats.write().await = stats.clone();
        stats
    }

    pub async fn latest_stats(&self) -> CleanupStats {
        self.stats.read().await.clone()
    }
}

fn count_or_log(task: &str, outcome: DomainResult<u64>) -> u64 {
    match outcome {
        Ok(count) => count,
        Err(err) => {
            tracing::warn!("cleanup task '{task}' failed: {err}");
            0
        }
    }
}
