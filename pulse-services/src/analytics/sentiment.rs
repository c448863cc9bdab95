//! Per-symbol sentiment tracking
//!
//! One tracker per mentioned symbol, smoothed with an exponential moving
//! average and evicted after a day of silence. The book also produces the
//! aggregate social-sentiment view across every tracked symbol.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use pulse_core::SocialSentimentTrend;

use super::window::TrendPoint;

/// Keyword ring capacity per tracker
const KEYWORD_RING: usize = 20;
/// Sentiment history points kept per tracker
const HISTORY_CAP: usize = 500;
/// |mean change| above which the aggregate counts as trending
const TRENDING_THRESHOLD: f64 = 0.05;
/// Symbols listed in the aggregate view
const TOP_SYMBOLS: usize = 5;

/// Rolling sentiment state for one symbol
#[derive(Debug, Clone)]
pub struct SentimentTracker {
    pub symbol: String,
    pub current_sentiment: f64,
    pub previous_sentiment: f64,
    /// Mention counter; monotonically non-decreasing until eviction
    pub volume: u64,
    pub sources: HashSet<String>,
    keywords: VecDeque<String>,
    history: VecDeque<TrendPoint>,
    pub last_updated: DateTime<Utc>,
}

impl SentimentTracker {
    /// First mention: the tracker starts at the observed score
    fn new(symbol: &str, score: f64, now: DateTime<Utc>) -> Self {
        let mut history = VecDeque::new();
        history.push_back(TrendPoint { at: now, value: score });
        Self {
            symbol: symbol.to_string(),
            current_sentiment: score,
            previous_sentiment: score,
            volume: 1,
            sources: HashSet::new(),
            keywords: VecDeque::new(),
            history,
            last_updated: now,
        }
    }

    /// Fold in one observation: `new = (1 - a)·old + a·incoming`
    fn apply(&mut self, score: f64, smoothing: f64, now: DateTime<Utc>) -> f64 {
        self.previous_sentiment = self.current_sentiment;
        self.current_sentiment =
            (1.0 - smoothing) * self.current_sentiment + smoothing * score;
        self.volume += 1;
        self.last_updated = now;
        self.history.push_back(TrendPoint {
            at: now,
            value: self.current_sentiment,
        });
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
        self.current_sentiment - self.previous_sentiment
    }

    fn record_context(&mut self, source: &str, keywords: &[String]) {
        self.sources.insert(source.to_string());
        for keyword in keywords {
            self.keywords.push_back(keyword.clone());
            while self.keywords.len() > KEYWORD_RING {
                self.keywords.pop_front();
            }
        }
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn history(&self) -> impl Iterator<Item = &TrendPoint> {
        self.history.iter()
    }
}

/// Outcome of folding one observation into a tracker
#[derive(Debug, Clone, Copy)]
pub struct SentimentUpdate {
    pub previous: f64,
    pub current: f64,
    pub change: f64,
    pub volume: u64,
}

/// All sentiment trackers, keyed by symbol
#[derive(Debug, Default)]
pub struct SentimentBook {
    trackers: RwLock<HashMap<String, SentimentTracker>>,
}

impl SentimentBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the symbol's tracker, creating it on first
    /// mention.
    pub fn update(
        &self,
        symbol: &str,
        score: f64,
        source: &str,
        keywords: &[String],
        smoothing: f64,
    ) -> SentimentUpdate {
        use std::collections::hash_map::Entry;

        let now = Utc::now();
        let key = symbol.to_uppercase();
        let mut trackers = self.trackers.write();
        match trackers.entry(key.clone()) {
            Entry::Vacant(slot) => {
                // first mention is not smoothed
                let tracker = slot.insert(SentimentTracker::new(&key, score, now));
                tracker.record_context(source, keywords);
                SentimentUpdate {
                    previous: tracker.previous_sentiment,
                    current: tracker.current_sentiment,
                    change: 0.0,
                    volume: tracker.volume,
                }
            }
            Entry::Occupied(mut slot) => {
                let tracker = slot.get_mut();
                let change = tracker.apply(score, smoothing, now);
                tracker.record_context(source, keywords);
                SentimentUpdate {
                    previous: tracker.previous_sentiment,
                    current: tracker.current_sentiment,
                    change,
                    volume: tracker.volume,
                }
            }
        }
    }

    /// Drop trackers idle longer than `ttl`; returns how many were evicted
    pub fn evict_stale(&self, ttl: std::time::Duration) -> usize {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::hours(24));
        let mut trackers = self.trackers.write();
        let before = trackers.len();
        trackers.retain(|_, tracker| tracker.last_updated >= cutoff);
        let evicted = before - trackers.len();
        if evicted > 0 {
            debug!("Evicted {} stale sentiment trackers", evicted);
        }
        evicted
    }

    /// Aggregate social sentiment across all tracked symbols
    pub fn aggregate(&self) -> SocialSentimentTrend {
        let trackers = self.trackers.read();
        if trackers.is_empty() {
            return SocialSentimentTrend::neutral();
        }

        let n = trackers.len() as f64;
        let average_sentiment =
            trackers.values().map(|t| t.current_sentiment).sum::<f64>() / n;
        let sentiment_change = trackers
            .values()
            .map(|t| t.current_sentiment - t.previous_sentiment)
            .sum::<f64>()
            / n;

        let mut by_volume: Vec<(&String, u64)> = trackers
            .iter()
            .map(|(symbol, t)| (symbol, t.volume))
            .collect();
        by_volume.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        SocialSentimentTrend {
            average_sentiment,
            sentiment_change,
            trending: sentiment_change.abs() > TRENDING_THRESHOLD,
            sample_size: trackers.len(),
            top_symbols: by_volume
                .into_iter()
                .take(TOP_SYMBOLS)
                .map(|(symbol, _)| symbol.clone())
                .collect(),
        }
    }

    /// Sentiment history for one symbol
    pub fn points(&self, symbol: &str) -> Vec<TrendPoint> {
        self.trackers
            .read()
            .get(&symbol.to_uppercase())
            .map(|t| t.history.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every tracker's history merged into one time-ordered series
    pub fn merged_points(&self) -> Vec<TrendPoint> {
        let trackers = self.trackers.read();
        let mut points: Vec<TrendPoint> = trackers
            .values()
            .flat_map(|t| t.history.iter().copied())
            .collect();
        points.sort_by_key(|p| p.at);
        points
    }

    pub fn tracked_symbols(&self) -> Vec<String> {
        self.trackers.read().keys().cloned().collect()
    }

    pub fn volume_of(&self, symbol: &str) -> Option<u64> {
        self.trackers
            .read()
            .get(&symbol.to_uppercase())
            .map(|t| t.volume)
    }

    pub fn len(&self) -> usize {
        self.trackers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_update_is_exact() {
        let book = SentimentBook::new();
        book.update("AAPL", 0.2, "reuters", &[], 0.2);
        let update = book.update("AAPL", 1.0, "reuters", &[], 0.2);
        // 0.8 * 0.2 + 0.2 * 1.0
        assert!((update.current - 0.36).abs() < 1e-12);
        assert!((update.previous - 0.2).abs() < 1e-12);
    }

    #[test]
    fn volume_is_monotone_and_sources_accumulate() {
        let book = SentimentBook::new();
        let mut last_volume = 0;
        for i in 0..10 {
            let source = if i % 2 == 0 { "reuters" } else { "bloomberg" };
            let update = book.update("TSLA", 0.1, source, &[], 0.2);
            assert!(update.volume > last_volume);
            last_volume = update.volume;
        }
        assert_eq!(last_volume, 10);
    }

    #[test]
    fn keyword_ring_is_bounded() {
        let book = SentimentBook::new();
        for i in 0..30 {
            book.update("NVDA", 0.1, "x", &[format!("kw{}", i)], 0.2);
        }
        let trackers = book.trackers.read();
        let tracker = trackers.get("NVDA").unwrap();
        let keywords: Vec<&str> = tracker.keywords().collect();
        assert_eq!(keywords.len(), 20);
        // Oldest entries fell off the ring
        assert_eq!(keywords.first(), Some(&"kw10"));
        assert_eq!(keywords.last(), Some(&"kw29"));
    }

    #[test]
    fn symbols_are_normalized_to_uppercase() {
        let book = SentimentBook::new();
        book.update("aapl", 0.5, "x", &[], 0.2);
        book.update("AAPL", 0.5, "x", &[], 0.2);
        assert_eq!(book.len(), 1);
        assert_eq!(book.volume_of("aapl"), Some(2));
    }

    #[test]
    fn eviction_drops_only_stale_trackers() {
        let book = SentimentBook::new();
        book.update("OLD", 0.1, "x", &[], 0.2);
        book.update("NEW", 0.1, "x", &[], 0.2);
        {
            let mut trackers = book.trackers.write();
            trackers.get_mut("OLD").unwrap().last_updated =
                Utc::now() - ChronoDuration::hours(25);
        }
        let evicted = book.evict_stale(std::time::Duration::from_secs(24 * 3600));
        assert_eq!(evicted, 1);
        assert_eq!(book.tracked_symbols(), vec!["NEW".to_string()]);
    }

    #[test]
    fn aggregate_reports_top_symbols_by_volume() {
        let book = SentimentBook::new();
        for _ in 0..5 {
            book.update("AAPL", 0.4, "x", &[], 0.2);
        }
        book.update("TSLA", -0.2, "x", &[], 0.2);
        let aggregate = book.aggregate();
        assert_eq!(aggregate.sample_size, 2);
        assert_eq!(aggregate.top_symbols.first(), Some(&"AAPL".to_string()));
    }
}
