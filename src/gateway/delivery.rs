//! At-least-once delivery tracking.
//!
//! Events in the task/subtask/message families are tracked per
//! `(message_id, client_id)` until acknowledged. A periodic sweep re-sends
//! entries that have gone unacknowledged too long, up to the attempt cap.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::gateway::protocol::ServerFrame;

/// One unacknowledged delivery.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub message_id: String,
    pub client_id: String,
    pub frame: ServerFrame,
    pub attempts: u32,
    pub sent_at: DateTime<Utc>,
}

/// Tracks unacknowledged deliveries and decides retries.
pub struct DeliveryTracker {
    pending: RwLock<HashMap<(String, String), PendingDelivery>>,
    retry_timeout: Duration,
    max_attempts: u32,
}

impl DeliveryTracker {
    pub fn new(retry_timeout_secs: u64, max_attempts: u32) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            retry_timeout: Duration::seconds(retry_timeout_secs as i64),
            max_attempts,
        }
    }

    /// Record the initial send (attempt 1).
    pub async fn track(&self, message_id: &str, client_id: &str, frame: ServerFrame) {
        let entry = PendingDelivery {
            message_id: message_id.to_string(),
            client_id: client_id.to_string(),
            frame,
            attempts: 1,
            sent_at: Utc::now(),
        };
        self.pending
            .write()
            .await
            .insert((message_id.to_string(), client_id.to_string()), entry);
    }

    /// Clear one delivery on acknowledgment. Returns whether it existed.
    pub async fn ack(&self, message_id: &str, client_id: &str) -> bool {
        self.pending
            .write()
            .await
            .remove(&(message_id.to_string(), client_id.to_string()))
            .is_some()
    }

    /// Drop every pending delivery for a disconnected client.
    pub async fn drop_client(&self, client_id: &str) {
        self.pending
            .write()
            .await
            .retain(|(_, cid), _| cid != client_id);
    }

    /// Entries due for another attempt: older than the retry timeout and
    /// under the attempt cap. Exhausted entries are dropped here. Each
    /// returned entry has its attempt count bumped and `sent_at` reset.
    pub async fn due_retries(&self, now: DateTime<Utc>) -> Vec<PendingDelivery> {
        let mut pending = self.pending.write().await;
        let mut due = Vec::new();

        pending.retain(|_, entry| {
            if now - entry.sent_at < self.retry_timeout {
                return true;
            }
            if entry.attempts >= self.max_attempts {
                tracing::debug!(
                    message_id = %entry.message_id,
                    client_id = %entry.client_id,
                    attempts = entry.attempts,
                    "dropping undeliverable event"
                );
                return false;
            }
            entry.attempts += 1;
            entry.sent_at = now;
            due.push(entry.clone());
            true
        });

        due
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ServerFrame {
        ServerFrame::event(
            Some("m-1".into()),
            "global",
            "task.completed",
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn ack_clears_pending_entry() {
        let tracker = DeliveryTracker::new(5, 3);
        tracker.track("m-1", "c-1", frame()).await;
        assert_eq!(tracker.pending_count().await, 1);
        assert!(tracker.ack("m-1", "c-1").await);
        assert!(!tracker.ack("m-1", "c-1").await);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn fresh_entries_are_not_retried() {
        let tracker = DeliveryTracker::new(5, 3);
        tracker.track("m-1", "c-1", frame()).await;
        assert!(tracker.due_retries(Utc::now()).await.is_empty());
        assert_eq!(tracker.pending_count().await, 1);
    }

    #[tokio::test]
    async fn stale_entries_retry_until_the_cap_then_drop() {
        let tracker = DeliveryTracker::new(5, 3);
        tracker.track("m-1", "c-1", frame()).await;

        // Second attempt.
        let later = Utc::now() + Duration::seconds(6);
        let due = tracker.due_retries(later).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 2);

        // Third attempt.
        let later = later + Duration::seconds(6);
        let due = tracker.due_retries(later).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].attempts, 3);

        // Cap reached: dropped, not retried.
        let later = later + Duration::seconds(6);
        assert!(tracker.due_retries(later).await.is_empty());
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn disconnect_drops_all_entries_for_the_client() {
        let tracker = DeliveryTracker::new(5, 3);
        tracker.track("m-1", "c-1", frame()).await;
        tracker.track("m-2", "c-1", frame()).await;
        tracker.track("m-1", "c-2", frame()).await;

        tracker.drop_client("c-1").await;
        assert_eq!(tracker.pending_count().await, 1);
        assert!(tracker.ack("m-1", "c-2").await);
    }
}
