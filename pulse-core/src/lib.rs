//! Core types for the Pulse signal gateway
//!
//! This crate defines the wire protocol spoken over the client WebSocket
//! channel, the producer-side analysis events, and the domain types shared
//! by the gateway services. It is intentionally free of async and I/O.

pub mod error;
pub mod events;
pub mod filter;
pub mod message;
pub mod protocol;
pub mod topic;
pub mod trend;

pub use error::{GatewayError, GatewayResult};
pub use events::AnalysisEvent;
pub use filter::FilterSet;
pub use message::{Insight, Priority, StreamMessage, StreamPayload};
pub use protocol::{
    ClientCommand, ConnectionSnapshot, ErrorCode, RateLimitInfo, ServerFrame,
};
pub use topic::Topic;
pub use trend::{
    AlertLevel, DetectedTrend, MomentumAnalysis, NewsVelocityMetrics, PatternKind,
    RecognizedPattern, SocialSentimentTrend, TrendDirection, TrendKind, TrendReport,
};
