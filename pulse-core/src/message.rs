//! Stream messages pushed to subscribed clients
//!
//! A [`StreamMessage`] is constructed once at the producer boundary and is
//! read-only from then on; the dispatcher fans the same value out to every
//! matching connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trend::{AlertLevel, TrendReport};
use crate::Topic;

/// Delivery priority of a stream message
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One extracted market insight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub symbol: String,
    pub headline: String,
    /// Confidence in the insight, [0, 1]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<crate::trend::TrendDirection>,
}

/// Typed payload of a stream message, one variant per topic schema.
///
/// Producer events are decoded into this closed union exactly once at the
/// gateway boundary; filters and clients never see untyped JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamPayload {
    /// A piece of content that finished analysis
    ContentAnalysis {
        content_id: String,
        sentiment: f64,
        categories: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// Extracted market insights
    Insights { insights: Vec<Insight> },
    /// A composite trend report
    TrendReport(TrendReport),
    /// A low-latency sentiment swing for one symbol
    RealTimeTrend {
        symbol: String,
        previous_sentiment: f64,
        current_sentiment: f64,
        change: f64,
        volume: u64,
    },
    /// A content quality score
    QualityScore {
        content_id: String,
        score: f64,
        confidence: f64,
    },
    /// A breaking news flash
    BreakingNews {
        headline: String,
        summary: String,
        /// Urgency score, [0, 1]
        urgency: f64,
    },
    /// Pipeline component status
    SystemStatus {
        component: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl StreamPayload {
    /// Wire name of the payload variant (used by content-type filters)
    pub fn kind_str(&self) -> &'static str {
        match self {
            StreamPayload::ContentAnalysis { .. } => "content_analysis",
            StreamPayload::Insights { .. } => "insights",
            StreamPayload::TrendReport(_) => "trend_report",
            StreamPayload::RealTimeTrend { .. } => "real_time_trend",
            StreamPayload::QualityScore { .. } => "quality_score",
            StreamPayload::BreakingNews { .. } => "breaking_news",
            StreamPayload::SystemStatus { .. } => "system_status",
        }
    }

    /// Score carried by the payload, if the schema has one
    pub fn score(&self) -> Option<f64> {
        match self {
            StreamPayload::QualityScore { score, .. } => Some(*score),
            StreamPayload::TrendReport(report) => Some(report.alert_score),
            StreamPayload::BreakingNews { urgency, .. } => Some(*urgency),
            _ => None,
        }
    }

    /// Confidence carried by the payload, if the schema has one
    pub fn confidence(&self) -> Option<f64> {
        match self {
            StreamPayload::QualityScore { confidence, .. } => Some(*confidence),
            StreamPayload::Insights { insights } => insights
                .iter()
                .map(|i| i.confidence)
                .fold(None, |acc, c| Some(acc.map_or(c, |a: f64| a.max(c)))),
            _ => None,
        }
    }

    /// Alert level carried by the payload, if any
    pub fn alert_level(&self) -> Option<AlertLevel> {
        match self {
            StreamPayload::TrendReport(report) => Some(report.alert_level),
            _ => None,
        }
    }

    /// Content categories carried by the payload, if any
    pub fn categories(&self) -> Option<&[String]> {
        match self {
            StreamPayload::ContentAnalysis { categories, .. } => Some(categories),
            _ => None,
        }
    }
}

/// A message flowing from the analytics side to subscribed clients.
///
/// Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMessage {
    pub topic: Topic,
    pub timestamp: DateTime<Utc>,
    pub payload: StreamPayload,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Symbols this message concerns (used by symbol filters)
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl StreamMessage {
    /// Construct a message stamped with the current time
    pub fn new(topic: Topic, payload: StreamPayload, priority: Priority) -> Self {
        Self {
            topic,
            timestamp: Utc::now(),
            payload,
            priority,
            source: None,
            content_id: None,
            symbols: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }
}
