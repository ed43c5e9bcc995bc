//! Channel taxonomy.
//!
//! `global` and `metrics` match exactly; `agents/{id}`, `sessions/{id}` and
//! `topics/{t}` match by prefix. Anything else is invalid.

use std::fmt;

/// A parsed, validated channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// System-wide broadcast.
    Global,
    /// Periodic `metric.update` only.
    Metrics,
    /// Private per-agent channel; subscribing requires auth or identity.
    Agent(String),
    /// Session-scoped channel.
    Session(String),
    /// Public topic grouping.
    Topic(String),
}

impl Channel {
    /// Parse a raw channel string against the taxonomy.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "global" => Some(Self::Global),
            "metrics" => Some(Self::Metrics),
            _ => {
                if let Some(id) = raw.strip_prefix("agents/") {
                    (!id.is_empty() && !id.contains('/')).then(|| Self::Agent(id.to_string()))
                } else if let Some(id) = raw.strip_prefix("sessions/") {
                    (!id.is_empty() && !id.contains('/')).then(|| Self::Session(id.to_string()))
                } else if let Some(topic) = raw.strip_prefix("topics/") {
                    (!topic.is_empty() && !topic.contains('/'))
                        .then(|| Self::Topic(topic.to_string()))
                } else {
                    None
                }
            }
        }
    }

    /// Whether subscribing requires an authenticated identity other than
    /// `agent_id` itself.
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Agent(_))
    }

    /// Whether publishing from a client requires authentication.
    pub fn publish_requires_auth(&self) -> bool {
        matches!(self, Self::Agent(_) | Self::Session(_))
    }

    /// The canonical per-agent channel name.
    pub fn agent(agent_id: &str) -> String {
        format!("agents/{agent_id}")
    }

    /// The canonical per-session channel name.
    pub fn session(session_id: &str) -> String {
        format!("sessions/{session_id}")
    }

    /// The canonical topic channel name.
    pub fn topic(topic: &str) -> String {
        format!("topics/{topic}")
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Metrics => write!(f, "metrics"),
            Self::Agent(id) => write!(f, "agents/{id}"),
            Self::Session(id) => write!(f, "sessions/{id}"),
            Self::Topic(topic) => write!(f, "topics/{topic}"),
        }
    }
}

pub const GLOBAL_CHANNEL: &str = "global";
pub const METRICS_CHANNEL: &str = "metrics";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_channels_parse() {
        assert_eq!(Channel::parse("global"), Some(Channel::Global));
        assert_eq!(Channel::parse("metrics"), Some(Channel::Metrics));
    }

    #[test]
    fn prefixed_channels_parse() {
        assert_eq!(
            Channel::parse("agents/builder-1"),
            Some(Channel::Agent("builder-1".into()))
        );
        assert_eq!(
            Channel::parse("sessions/s-42"),
            Some(Channel::Session("s-42".into()))
        );
        assert_eq!(
            Channel::parse("topics/deploys"),
            Some(Channel::Topic("deploys".into()))
        );
    }

    #[test]
    fn malformed_channels_rejected() {
        assert_eq!(Channel::parse(""), None);
        assert_eq!(Channel::parse("agents/"), None);
        assert_eq!(Channel::parse("agents/a/b"), None);
        assert_eq!(Channel::parse("Global"), None);
        assert_eq!(Channel::parse("random"), None);
        assert_eq!(Channel::parse("topic/deploys"), None);
    }

    #[test]
    fn privacy_and_publish_auth() {
        assert!(Channel::parse("agents/x").unwrap().is_private());
        assert!(!Channel::parse("topics/x").unwrap().is_private());
        assert!(Channel::parse("sessions/x").unwrap().publish_requires_auth());
        assert!(!Channel::Global.publish_requires_auth());
    }

    #[test]
    fn display_round_trips() {
        for raw in ["global", "metrics", "agents/a", "sessions/s", "topics/t"] {
            assert_eq!(Channel::parse(raw).unwrap().to_string(), raw);
        }
    }
}
