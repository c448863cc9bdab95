//! Trend analytics result types
//!
//! These are the outputs of the trend analytics engine: individual detected
//! trends, momentum, aggregated social sentiment, news velocity and the
//! composite report with its alert level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a detected trend or pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

/// Which signal dimension a detected trend came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    Sentiment,
    Volume,
    Momentum,
}

/// A single detected trend for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedTrend {
    pub symbol: String,
    pub kind: TrendKind,
    pub direction: TrendDirection,
    /// Trend strength, clamped to [0, 1]
    pub strength: f64,
    /// Confidence in the trend, clamped to [0, 1]
    pub confidence: f64,
}

/// Weighted multi-horizon momentum for a symbol (or the whole tape)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumAnalysis {
    pub short_term: f64,
    pub medium_term: f64,
    pub long_term: f64,
    /// Weighted blend of the three horizons, clamped to [-1, 1]
    pub overall: f64,
    /// (short - medium) - (medium - long)
    pub acceleration: f64,
}

impl MomentumAnalysis {
    /// A zero-valued momentum, used when an analysis branch degrades
    pub fn neutral() -> Self {
        Self {
            short_term: 0.0,
            medium_term: 0.0,
            long_term: 0.0,
            overall: 0.0,
            acceleration: 0.0,
        }
    }
}

/// Aggregate sentiment across all tracked symbols
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSentimentTrend {
    pub average_sentiment: f64,
    /// Mean change from the previous sentiment reading
    pub sentiment_change: f64,
    /// Whether the aggregate is moving enough to be considered trending
    pub trending: bool,
    /// Number of trackers contributing to the aggregate
    pub sample_size: usize,
    /// Most-mentioned symbols, highest volume first
    pub top_symbols: Vec<String>,
}

impl SocialSentimentTrend {
    pub fn neutral() -> Self {
        Self {
            average_sentiment: 0.0,
            sentiment_change: 0.0,
            trending: false,
            sample_size: 0,
            top_symbols: Vec::new(),
        }
    }
}

/// News velocity snapshot: current hour against the rolling 24h picture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsVelocityMetrics {
    /// Articles counted in the current hour slot
    pub current_hour: u32,
    /// Mean articles per hour over the 24 slots
    pub hourly_average: f64,
    /// current_hour / hourly_average (0 when no history)
    pub velocity_change: f64,
    /// Highest single-hour count observed
    pub peak_velocity: u32,
    /// Total articles across the 24 slots
    pub total_24h: u64,
}

impl NewsVelocityMetrics {
    pub fn neutral() -> Self {
        Self {
            current_hour: 0,
            hourly_average: 0.0,
            velocity_change: 0.0,
            peak_velocity: 0,
            total_24h: 0,
        }
    }
}

/// Kind of recognized price/sentiment pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Breakout,
    Reversal,
    MomentumAcceleration,
}

/// A recognized pattern in a symbol's sentiment series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedPattern {
    pub kind: PatternKind,
    pub direction: TrendDirection,
    /// Size of the move that triggered recognition
    pub magnitude: f64,
    /// Confidence, clamped to [0, 1]
    pub confidence: f64,
}

/// Coarse composite severity derived from multiple trend signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    /// Map a composite alert score to a level.
    ///
    /// The critical boundary is strict: a score of exactly 1.5 (or 1.0) is
    /// `High`, never `Critical`; exactly 0.5 is `Medium`.
    pub fn from_score(score: f64) -> AlertLevel {
        if score > 1.5 {
            AlertLevel::Critical
        } else if score >= 1.0 {
            AlertLevel::High
        } else if score >= 0.5 {
            AlertLevel::Medium
        } else {
            AlertLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The composite output of one trend detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendReport {
    pub generated_at: DateTime<Utc>,
    /// Symbol the pass was scoped to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub trends: Vec<DetectedTrend>,
    pub momentum: MomentumAnalysis,
    pub sentiment: SocialSentimentTrend,
    pub news_velocity: NewsVelocityMetrics,
    pub patterns: Vec<RecognizedPattern>,
    pub alert_level: AlertLevel,
    pub alert_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_thresholds_are_strict() {
        assert_eq!(AlertLevel::from_score(1.51), AlertLevel::Critical);
        // exactly at the critical boundary stays high
        assert_eq!(AlertLevel::from_score(1.5), AlertLevel::High);
        assert_eq!(AlertLevel::from_score(1.0), AlertLevel::High);
        assert_eq!(AlertLevel::from_score(0.99), AlertLevel::Medium);
        assert_eq!(AlertLevel::from_score(0.5), AlertLevel::Medium);
        assert_eq!(AlertLevel::from_score(0.49), AlertLevel::Low);
        assert_eq!(AlertLevel::from_score(0.0), AlertLevel::Low);
    }
}
