//! Broadcast topics clients can subscribe to

use serde::{Deserialize, Serialize};

/// A named broadcast channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Analyzed content items as they flow through the pipeline
    ContentProcessed,
    /// Extracted market insights
    MarketInsights,
    /// Composite trend reports above the alert threshold
    TrendAlerts,
    /// Content quality score updates
    ScoreUpdates,
    /// Low-latency per-symbol sentiment swings
    RealTimeTrends,
    /// Breaking news flashes
    BreakingNews,
    /// Gateway / pipeline component status
    SystemStatus,
}

impl Topic {
    /// Every known topic, in protocol order
    pub const ALL: [Topic; 7] = [
        Topic::ContentProcessed,
        Topic::MarketInsights,
        Topic::TrendAlerts,
        Topic::ScoreUpdates,
        Topic::RealTimeTrends,
        Topic::BreakingNews,
        Topic::SystemStatus,
    ];

    /// Wire name of this topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ContentProcessed => "content_processed",
            Topic::MarketInsights => "market_insights",
            Topic::TrendAlerts => "trend_alerts",
            Topic::ScoreUpdates => "score_updates",
            Topic::RealTimeTrends => "real_time_trends",
            Topic::BreakingNews => "breaking_news",
            Topic::SystemStatus => "system_status",
        }
    }

    /// Parse a wire name, returning `None` for unknown topics
    pub fn parse(s: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Parse a list of requested topic names, keeping only known topics.
    ///
    /// Order-preserving and deduplicating; unknown names are dropped rather
    /// than rejected so a partially valid subscribe request still succeeds.
    pub fn parse_many<S: AsRef<str>>(names: &[S]) -> Vec<Topic> {
        let mut seen = Vec::new();
        for name in names {
            if let Some(topic) = Topic::parse(name.as_ref()) {
                if !seen.contains(&topic) {
                    seen.push(topic);
                }
            }
        }
        seen
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
