//! Wire protocol frames for the real-time gateway.
//!
//! Every frame is a JSON object carrying `timestamp` in milliseconds since
//! the epoch. Client frames are discriminated by `type`; server event
//! frames have no `type` field.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Close codes used by the gateway.
pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_PING_TIMEOUT: u16 = 4000;
pub const CLOSE_INVALID_TOKEN: u16 = 4001;
pub const CLOSE_TOKEN_REQUIRED: u16 = 4002;
pub const CLOSE_MISSING_CREDENTIALS: u16 = 4003;

/// Error code for unparseable frames.
pub const PARSE_ERROR_CODE: &str = "PARSE_ERROR";

/// Milliseconds since epoch, the protocol's timestamp representation.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Client-to-server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe {
        channel: String,
        id: Option<String>,
    },
    Unsubscribe {
        channel: String,
        id: Option<String>,
    },
    Publish {
        channel: String,
        event: String,
        data: serde_json::Value,
        id: Option<String>,
    },
    Auth {
        agent_id: Option<String>,
        session_id: Option<String>,
        token: Option<String>,
        id: Option<String>,
    },
    Ping,
    Pong,
    Ack {
        message_id: String,
    },
}

/// Server-to-client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Connected {
        #[serde(rename = "type")]
        kind: &'static str,
        client_id: String,
        timestamp: i64,
    },
    Ping {
        #[serde(rename = "type")]
        kind: &'static str,
        timestamp: i64,
    },
    Pong {
        #[serde(rename = "type")]
        kind: &'static str,
        timestamp: i64,
    },
    Ack {
        #[serde(rename = "type")]
        kind: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: i64,
    },
    Event {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        channel: String,
        event: String,
        data: serde_json::Value,
        timestamp: i64,
    },
    Error {
        error: String,
        code: String,
        timestamp: i64,
    },
}

impl ServerFrame {
    pub fn connected(client_id: impl Into<String>) -> Self {
        Self::Connected {
            kind: "connected",
            client_id: client_id.into(),
            timestamp: now_millis(),
        }
    }

    pub fn ping() -> Self {
        Self::Ping {
            kind: "ping",
            timestamp: now_millis(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            kind: "pong",
            timestamp: now_millis(),
        }
    }

    pub fn ack(id: Option<String>) -> Self {
        Self::Ack {
            kind: "ack",
            id,
            success: true,
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn nack(id: Option<String>, error: impl Into<String>) -> Self {
        Self::Ack {
            kind: "ack",
            id,
            success: false,
            error: Some(error.into()),
            timestamp: now_millis(),
        }
    }

    pub fn event(
        id: Option<String>,
        channel: impl Into<String>,
        event: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self::Event {
            id,
            channel: channel.into(),
            event: event.into(),
            data,
            timestamp: now_millis(),
        }
    }

    pub fn error(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            code: code.into(),
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_parse_by_type() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"subscribe","channel":"global","id":"1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Subscribe { ref channel, .. } if channel == "global"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"ack","message_id":"m-1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ack { ref message_id } if message_id == "m-1"));

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let frame: ClientFrame = serde_json::from_str(
            r#"{"type":"publish","channel":"global","event":"system.info","data":{},"timestamp":1}"#,
        )
        .unwrap();
        assert!(matches!(frame, ClientFrame::Publish { .. }));
    }

    #[test]
    fn event_frame_has_no_type_field() {
        let frame = ServerFrame::event(None, "global", "task.created", serde_json::json!({"x": 1}));
        let json = serde_json::to_value(&frame).unwrap();
        assert!(json.get("type").is_none());
        assert_eq!(json["channel"], "global");
        assert_eq!(json["event"], "task.created");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn ack_frames_carry_success() {
        let json = serde_json::to_value(ServerFrame::nack(Some("7".into()), "denied")).unwrap();
        assert_eq!(json["type"], "ack");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "denied");
        assert_eq!(json["id"], "7");
    }
}
