//! WebSocket protocol for client connections
//!
//! JSON-object commands from client to gateway and push frames from gateway
//! to client, tagged with a `type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Priority, StreamMessage};
use crate::{FilterSet, Topic};

// ============================================================================
// Client -> Server Commands
// ============================================================================

/// Commands sent from client to gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Subscribe to one or more topics, optionally narrowing with filters
    Subscribe {
        /// Requested topic names; unknown names are dropped server-side
        types: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<FilterSet>,
    },
    /// Unsubscribe from topics (no-op per topic not currently subscribed)
    Unsubscribe { types: Vec<String> },
    /// Shallow-merge a partial filter set into the active filters
    UpdateFilters { filters: FilterSet },
    /// Request a snapshot of this connection's state
    GetStatus,
    /// Keep-alive
    Ping,
}

// ============================================================================
// Server -> Client Frames
// ============================================================================

/// Rate-limit configuration advertised at connection time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub max_tokens: u32,
    pub refill_rate: u32,
    pub refill_interval_secs: u64,
}

/// Read-only projection of a connection's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub connection_id: String,
    pub subscriptions: Vec<Topic>,
    pub filters: FilterSet,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub rate_tokens: u32,
}

/// Frames pushed from gateway to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once on accept
    ConnectionEstablished {
        connection_id: String,
        available_topics: Vec<Topic>,
        rate_limit: RateLimitInfo,
    },
    /// Subscription confirmed
    Subscribed {
        types: Vec<Topic>,
        filters: FilterSet,
        active_subscriptions: Vec<Topic>,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        types: Vec<Topic>,
        active_subscriptions: Vec<Topic>,
    },
    /// Filter update confirmed
    FiltersUpdated { filters: FilterSet },
    /// Snapshot response to `get_status`
    Status {
        #[serde(flatten)]
        snapshot: ConnectionSnapshot,
        total_clients: usize,
    },
    /// Pong response to `ping`
    Pong { timestamp: i64 },
    /// A stream message matching this connection's subscriptions
    StreamUpdate { message: StreamMessage },
    /// Command rejected by the token bucket; retry after the next refill
    RateLimited { retry_after_secs: u64 },
    /// Structured command error; the connection stays open
    Error { code: ErrorCode, message: String },
    /// Idle timeout notice, sent once before the gateway closes the socket
    Timeout { idle_secs: u64 },
    /// Admin-initiated disconnect notice
    ForcedDisconnect { reason: String },
    /// Admin broadcast
    AdminMessage { message: String, priority: Priority },
}

/// Error codes for command errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or unparseable command
    InvalidMessage,
    /// Command references an unknown connection; client must reconnect
    InvalidSession,
    /// Subscribe request contained no known topics
    NoValidTopics,
    /// Token bucket empty
    RateLimited,
    /// Gateway at its connection ceiling
    CapacityExceeded,
    /// Internal gateway error
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_parses_from_wire_json() {
        let raw = r#"{
            "type": "subscribe",
            "types": ["trend_alerts", "breaking_news"],
            "filters": {"symbols": ["AAPL"], "min_confidence": 0.7}
        }"#;
        let cmd: ClientCommand = serde_json::from_str(raw).unwrap();
        match cmd {
            ClientCommand::Subscribe { types, filters } => {
                assert_eq!(types, vec!["trend_alerts", "breaking_news"]);
                let filters = filters.unwrap();
                assert_eq!(filters.symbols, Some(vec!["AAPL".to_string()]));
                assert_eq!(filters.min_confidence, Some(0.7));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn ping_parses_without_payload() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Ping));
    }

    #[test]
    fn frames_serialize_with_snake_case_tag() {
        let frame = ServerFrame::RateLimited { retry_after_secs: 60 };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "rate_limited");
        assert_eq!(json["retry_after_secs"], 60);
    }
}
