//! Producer-side analysis events
//!
//! External analysis collaborators (content pipeline, scoring, insight
//! extraction) publish these typed events into the gateway's hub; the hub
//! maps each to a [`StreamMessage`] with an appropriate priority.

use serde::{Deserialize, Serialize};

use crate::message::{Insight, Priority, StreamMessage, StreamPayload};
use crate::trend::{AlertLevel, TrendReport};
use crate::Topic;

/// Confidence above which insights and scores are pushed at high priority
const HIGH_CONFIDENCE: f64 = 0.8;

/// An event emitted by an analysis producer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// A piece of content entered the pipeline; carries the raw text so the
    /// trend engine can run its own extraction pass over it
    ContentProcessed {
        content_id: String,
        text: String,
        source: String,
        #[serde(default)]
        categories: Vec<String>,
    },
    /// Insights were extracted for one or more symbols
    InsightsExtracted {
        insights: Vec<Insight>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// The trend engine produced a report above the alert threshold
    TrendDetected { report: TrendReport },
    /// An immediate sentiment swing bypassing the report cache
    TrendRealTimeUpdate {
        symbol: String,
        previous_sentiment: f64,
        current_sentiment: f64,
        change: f64,
        volume: u64,
    },
    /// A content item received its quality score
    ContentScored {
        content_id: String,
        score: f64,
        confidence: f64,
    },
    /// Breaking news flash
    NewsBreaking {
        headline: String,
        summary: String,
        #[serde(default)]
        symbols: Vec<String>,
        urgency: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Pipeline component status change
    SystemStatus {
        component: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl AnalysisEvent {
    /// The topic this event is broadcast on
    pub fn topic(&self) -> Topic {
        match self {
            AnalysisEvent::ContentProcessed { .. } => Topic::ContentProcessed,
            AnalysisEvent::InsightsExtracted { .. } => Topic::MarketInsights,
            AnalysisEvent::TrendDetected { .. } => Topic::TrendAlerts,
            AnalysisEvent::TrendRealTimeUpdate { .. } => Topic::RealTimeTrends,
            AnalysisEvent::ContentScored { .. } => Topic::ScoreUpdates,
            AnalysisEvent::NewsBreaking { .. } => Topic::BreakingNews,
            AnalysisEvent::SystemStatus { .. } => Topic::SystemStatus,
        }
    }

    /// Map this event to a stream message.
    ///
    /// Returns `None` for `ContentProcessed`: the hub routes that variant
    /// through the trend engine first and broadcasts the analyzed result.
    pub fn into_stream_message(self) -> Option<StreamMessage> {
        match self {
            AnalysisEvent::ContentProcessed { .. } => None,
            AnalysisEvent::InsightsExtracted { insights, source } => {
                let top_confidence = insights
                    .iter()
                    .map(|i| i.confidence)
                    .fold(0.0_f64, f64::max);
                let priority = if top_confidence > HIGH_CONFIDENCE {
                    Priority::High
                } else {
                    Priority::Medium
                };
                let symbols = insights.iter().map(|i| i.symbol.clone()).collect();
                let mut msg = StreamMessage::new(
                    Topic::MarketInsights,
                    StreamPayload::Insights { insights },
                    priority,
                )
                .with_symbols(symbols);
                if let Some(source) = source {
                    msg = msg.with_source(source);
                }
                Some(msg)
            }
            AnalysisEvent::TrendDetected { report } => {
                let priority = match report.alert_level {
                    AlertLevel::Critical => Priority::Critical,
                    AlertLevel::High => Priority::High,
                    _ => Priority::Medium,
                };
                let symbols = report
                    .trends
                    .iter()
                    .map(|t| t.symbol.clone())
                    .collect::<Vec<_>>();
                Some(
                    StreamMessage::new(
                        Topic::TrendAlerts,
                        StreamPayload::TrendReport(report),
                        priority,
                    )
                    .with_symbols(symbols),
                )
            }
            AnalysisEvent::TrendRealTimeUpdate {
                symbol,
                previous_sentiment,
                current_sentiment,
                change,
                volume,
            } => Some(
                StreamMessage::new(
                    Topic::RealTimeTrends,
                    StreamPayload::RealTimeTrend {
                        symbol: symbol.clone(),
                        previous_sentiment,
                        current_sentiment,
                        change,
                        volume,
                    },
                    Priority::High,
                )
                .with_symbols(vec![symbol]),
            ),
            AnalysisEvent::ContentScored {
                content_id,
                score,
                confidence,
            } => {
                let priority = if confidence > HIGH_CONFIDENCE {
                    Priority::High
                } else {
                    Priority::Medium
                };
                Some(
                    StreamMessage::new(
                        Topic::ScoreUpdates,
                        StreamPayload::QualityScore {
                            content_id: content_id.clone(),
                            score,
                            confidence,
                        },
                        priority,
                    )
                    .with_content_id(content_id),
                )
            }
            AnalysisEvent::NewsBreaking {
                headline,
                summary,
                symbols,
                urgency,
                source,
            } => {
                let mut msg = StreamMessage::new(
                    Topic::BreakingNews,
                    StreamPayload::BreakingNews {
                        headline,
                        summary,
                        urgency,
                    },
                    Priority::Critical,
                )
                .with_symbols(symbols);
                if let Some(source) = source {
                    msg = msg.with_source(source);
                }
                Some(msg)
            }
            AnalysisEvent::SystemStatus {
                component,
                status,
                detail,
            } => Some(StreamMessage::new(
                Topic::SystemStatus,
                StreamPayload::SystemStatus {
                    component,
                    status,
                    detail,
                },
                Priority::Low,
            )),
        }
    }
}
