//! Client-supplied delivery filters
//!
//! A [`FilterSet`] narrows which messages on a subscribed topic are actually
//! delivered. Every field is optional and an unset field never constrains;
//! set fields are AND-combined.

use serde::{Deserialize, Serialize};

use crate::trend::AlertLevel;
use crate::StreamMessage;

/// Per-connection delivery predicate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    /// Symbols of interest; matches on case-insensitive substring overlap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    /// Content categories of interest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Minimum score; only enforced when the payload carries a score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Minimum confidence; only enforced when the payload carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    /// Alert levels allow-list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_levels: Option<Vec<AlertLevel>>,
    /// Payload kinds allow-list (e.g. "content_analysis")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_types: Option<Vec<String>>,
    /// Sources allow-list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl FilterSet {
    /// Shallow-merge another filter set into this one.
    ///
    /// Only fields the other set actually supplies are overwritten; fields it
    /// leaves unset keep their current value.
    pub fn merge(&mut self, other: FilterSet) {
        if other.symbols.is_some() {
            self.symbols = other.symbols;
        }
        if other.categories.is_some() {
            self.categories = other.categories;
        }
        if other.min_score.is_some() {
            self.min_score = other.min_score;
        }
        if other.min_confidence.is_some() {
            self.min_confidence = other.min_confidence;
        }
        if other.alert_levels.is_some() {
            self.alert_levels = other.alert_levels;
        }
        if other.content_types.is_some() {
            self.content_types = other.content_types;
        }
        if other.sources.is_some() {
            self.sources = other.sources;
        }
    }

    /// Whether a message passes this filter.
    ///
    /// Dimensions are AND-combined; an unset dimension always passes, and a
    /// threshold dimension passes when the payload does not carry the field.
    pub fn matches(&self, message: &StreamMessage) -> bool {
        if let Some(wanted) = &self.symbols {
            if !wanted.is_empty() && !symbol_overlap(wanted, &message.symbols) {
                return false;
            }
        }

        if let Some(wanted) = &self.categories {
            if !wanted.is_empty() {
                if let Some(categories) = message.payload.categories() {
                    let any = categories.iter().any(|c| {
                        wanted.iter().any(|w| w.eq_ignore_ascii_case(c))
                    });
                    if !any {
                        return false;
                    }
                }
            }
        }

        if let (Some(min), Some(score)) = (self.min_score, message.payload.score()) {
            if score < min {
                return false;
            }
        }

        if let (Some(min), Some(confidence)) =
            (self.min_confidence, message.payload.confidence())
        {
            if confidence < min {
                return false;
            }
        }

        if let Some(allowed) = &self.alert_levels {
            if !allowed.is_empty() {
                if let Some(level) = message.payload.alert_level() {
                    if !allowed.contains(&level) {
                        return false;
                    }
                }
            }
        }

        if let Some(allowed) = &self.content_types {
            if !allowed.is_empty()
                && !allowed
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(message.payload.kind_str()))
            {
                return false;
            }
        }

        if let Some(allowed) = &self.sources {
            if !allowed.is_empty() {
                if let Some(source) = &message.source {
                    if !allowed.iter().any(|s| s.eq_ignore_ascii_case(source)) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// True when no dimension is set
    pub fn is_empty(&self) -> bool {
        *self == FilterSet::default()
    }
}

/// Case-insensitive substring overlap between the filter symbols and the
/// message symbols, in either direction ("AAPL" matches "aapl.us").
fn symbol_overlap(wanted: &[String], present: &[String]) -> bool {
    wanted.iter().any(|w| {
        let w = w.to_lowercase();
        present.iter().any(|p| {
            let p = p.to_lowercase();
            p.contains(&w) || w.contains(&p)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Priority, StreamPayload};
    use crate::Topic;

    fn message_with_symbols(symbols: &[&str]) -> StreamMessage {
        StreamMessage::new(
            Topic::RealTimeTrends,
            StreamPayload::RealTimeTrend {
                symbol: symbols.first().unwrap_or(&"").to_string(),
                previous_sentiment: 0.1,
                current_sentiment: 0.4,
                change: 0.3,
                volume: 5,
            },
            Priority::High,
        )
        .with_symbols(symbols.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn empty_filter_passes_everything() {
        let filter = FilterSet::default();
        assert!(filter.matches(&message_with_symbols(&["TSLA"])));
    }

    #[test]
    fn symbol_filter_is_case_insensitive_substring() {
        let filter = FilterSet {
            symbols: Some(vec!["AAPL".to_string()]),
            ..FilterSet::default()
        };
        assert!(filter.matches(&message_with_symbols(&["aapl"])));
        assert!(filter.matches(&message_with_symbols(&["AAPL.US", "MSFT"])));
        assert!(!filter.matches(&message_with_symbols(&["TSLA", "MSFT"])));
    }

    #[test]
    fn score_threshold_only_enforced_when_payload_has_score() {
        let filter = FilterSet {
            min_score: Some(0.8),
            ..FilterSet::default()
        };
        // RealTimeTrend carries no score field, so the threshold is inert
        assert!(filter.matches(&message_with_symbols(&["AAPL"])));

        let scored = StreamMessage::new(
            Topic::ScoreUpdates,
            StreamPayload::QualityScore {
                content_id: "c1".to_string(),
                score: 0.5,
                confidence: 0.9,
            },
            Priority::Medium,
        );
        assert!(!filter.matches(&scored));
    }

    #[test]
    fn source_allow_list() {
        let filter = FilterSet {
            sources: Some(vec!["reuters".to_string()]),
            ..FilterSet::default()
        };
        let msg = message_with_symbols(&["AAPL"]).with_source("Reuters");
        assert!(filter.matches(&msg));
        let other = message_with_symbols(&["AAPL"]).with_source("Bloomberg");
        assert!(!filter.matches(&other));
        // No source on the message: allow-list passes
        assert!(filter.matches(&message_with_symbols(&["AAPL"])));
    }

    #[test]
    fn merge_overwrites_only_supplied_fields() {
        let mut filter = FilterSet {
            symbols: Some(vec!["AAPL".to_string()]),
            min_score: Some(0.5),
            ..FilterSet::default()
        };
        filter.merge(FilterSet {
            min_score: Some(0.8),
            sources: Some(vec!["reuters".to_string()]),
            ..FilterSet::default()
        });
        assert_eq!(filter.symbols, Some(vec!["AAPL".to_string()]));
        assert_eq!(filter.min_score, Some(0.8));
        assert_eq!(filter.sources, Some(vec!["reuters".to_string()]));
    }
}
