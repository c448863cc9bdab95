//! Trend analytics: sentiment tracking, news velocity, pattern windows and
//! the engine that ties them into on-demand reports.

pub mod engine;
pub mod sentiment;
pub mod velocity;
pub mod window;

pub use engine::{ContentAnalysis, ContentAnalyzer, Horizon, KeywordAnalyzer, TrendEngine};
pub use sentiment::{SentimentBook, SentimentTracker, SentimentUpdate};
pub use velocity::NewsVelocityTracker;
pub use window::{TrendPoint, TrendWindow};
