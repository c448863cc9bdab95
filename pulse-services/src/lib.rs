//! Service layer for the Pulse streaming gateway
//!
//! This crate provides the runtime machinery: the connection registry and
//! rate limiting, the trend analytics engine, the event hub that links
//! analysis producers to the broadcast dispatcher, and the background
//! maintenance scheduler.

pub mod analytics;
pub mod config;
pub mod dispatcher;
pub mod hub;
pub mod rate_limiter;
pub mod registry;
pub mod scheduler;

pub use analytics::{
    ContentAnalysis, ContentAnalyzer, Horizon, KeywordAnalyzer, TrendEngine,
};
pub use config::{AnalyticsConfig, DispatchConfig, GatewayConfig, RateLimitConfig};
pub use dispatcher::Dispatcher;
pub use hub::{event_channel, EventHub, EventPublisher};
pub use rate_limiter::TokenBucket;
pub use registry::{
    ConnectionId, ConnectionRegistry, RegistryStats, SubscribeOutcome, TelemetryEvent,
    UnsubscribeOutcome,
};
pub use scheduler::Scheduler;
