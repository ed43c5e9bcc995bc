//! Agent capacity gauge and zone classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete label over `current_usage / max_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityZone {
    Green,
    Yellow,
    Orange,
    Red,
    Critical,
}

impl CapacityZone {
    /// Zone boundaries: green < 0.5, yellow < 0.75, orange < 0.9,
    /// red < 1.0, critical >= 1.0.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.5 {
            Self::Green
        } else if ratio < 0.75 {
            Self::Yellow
        } else if ratio < 0.9 {
            Self::Orange
        } else if ratio < 1.0 {
            Self::Red
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "green" => Some(Self::Green),
            "yellow" => Some(Self::Yellow),
            "orange" => Some(Self::Orange),
            "red" => Some(Self::Red),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Rolling token-usage gauge per agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCapacity {
    pub agent_id: String,
    pub current_usage: i64,
    pub max_capacity: i64,
    pub zone: CapacityZone,
    pub updated_at: DateTime<Utc>,
}

impl AgentCapacity {
    pub fn new(agent_id: impl Into<String>, max_capacity: i64) -> Self {
        Self {
            agent_id: agent_id.into(),
            current_usage: 0,
            max_capacity,
            zone: CapacityZone::Green,
            updated_at: Utc::now(),
        }
    }

    /// Record usage, clamping to `max_capacity` and reclassifying the zone.
    ///
    /// Returns true when the gauge crossed into critical with this update.
    pub fn record_usage(&mut self, tokens: i64, now: DateTime<Utc>) -> bool {
        let was_critical = self.zone == CapacityZone::Critical;
        let raw = self.current_usage.saturating_add(tokens.max(0));
        let ratio = if self.max_capacity > 0 {
            raw as f64 / self.max_capacity as f64
        } else {
            1.0
        };
        self.zone = CapacityZone::from_ratio(ratio);
        self.current_usage = raw.min(self.max_capacity);
        self.updated_at = now;
        !was_critical && self.zone == CapacityZone::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_boundaries() {
        assert_eq!(CapacityZone::from_ratio(0.0), CapacityZone::Green);
        assert_eq!(CapacityZone::from_ratio(0.49), CapacityZone::Green);
        assert_eq!(CapacityZone::from_ratio(0.5), CapacityZone::Yellow);
        assert_eq!(CapacityZone::from_ratio(0.75), CapacityZone::Orange);
        assert_eq!(CapacityZone::from_ratio(0.9), CapacityZone::Red);
        assert_eq!(CapacityZone::from_ratio(1.0), CapacityZone::Critical);
        assert_eq!(CapacityZone::from_ratio(3.0), CapacityZone::Critical);
    }

    #[test]
    fn usage_clamps_at_max_and_flags_critical_once() {
        let now = Utc::now();
        let mut capacity = AgentCapacity::new("agent-1", 100);
        assert!(!capacity.record_usage(40, now));
        assert_eq!(capacity.zone, CapacityZone::Green);

        // Crossing into critical fires exactly once.
        assert!(capacity.record_usage(80, now));
        assert_eq!(capacity.current_usage, 100);
        assert_eq!(capacity.zone, CapacityZone::Critical);
        assert!(!capacity.record_usage(10, now));
        assert_eq!(capacity.current_usage, 100);
    }
}
