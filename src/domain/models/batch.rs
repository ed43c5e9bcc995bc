//! Orchestration batch model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-wave grouping of subtasks submitted together, carrying an aggregated
/// synthesis once the wave completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationBatch {
    pub id: Uuid,
    pub session_id: String,
    pub wave_number: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Synthesized summary of the batch results, set after completion.
    pub synthesis: Option<serde_json::Value>,
}

impl OrchestrationBatch {
    pub fn new(session_id: impl Into<String>, wave_number: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            wave_number,
            created_at: Utc::now(),
            completed_at: None,
            synthesis: None,
        }
    }
}
