//! Trend analytics engine
//!
//! Ingests analyzed content into the per-symbol sentiment book and the news
//! velocity tracker, and produces composite trend reports on demand (and on
//! the scheduler's five-minute sweep). Detection runs five independent
//! analyses; a failure in any one degrades that dimension to a neutral value
//! instead of aborting the pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use pulse_core::{
    AlertLevel, AnalysisEvent, DetectedTrend, GatewayResult, MomentumAnalysis,
    NewsVelocityMetrics, RecognizedPattern, SocialSentimentTrend, TrendDirection, TrendKind,
    TrendReport,
};

use crate::config::AnalyticsConfig;
use crate::hub::EventPublisher;

use super::sentiment::SentimentBook;
use super::velocity::NewsVelocityTracker;
use super::window::{slope, TrendPoint, TrendWindow};

/// Velocity ratio above which the news flow counts as surging
const VELOCITY_SURGE: f64 = 1.5;
/// Slopes below this magnitude are treated as flat
const FLAT_SLOPE: f64 = 1e-4;
/// Symbol used for market-wide (non-symbol-scoped) trends
const MARKET_SYMBOL: &str = "MARKET";

/// Analysis horizon selecting which window feeds trend detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Short,
    #[default]
    Medium,
    Long,
}

/// Output of the NLP pass over one piece of content
#[derive(Debug, Clone, Default)]
pub struct ContentAnalysis {
    /// Overall sentiment in [-1, 1]
    pub sentiment: f64,
    /// Symbols mentioned
    pub symbols: Vec<String>,
    /// Key phrases extracted
    pub keywords: Vec<String>,
}

impl ContentAnalysis {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// External NLP collaborator: sentiment, entity and keyphrase extraction
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> anyhow::Result<ContentAnalysis>;
}

/// Lexicon-based fallback analyzer.
///
/// Good enough to run the gateway standalone and in tests; deployments wire
/// a real NLP service in through the [`ContentAnalyzer`] seam.
#[derive(Debug, Default)]
pub struct KeywordAnalyzer;

const POSITIVE_WORDS: &[&str] = &[
    "surge", "rally", "beat", "beats", "gain", "gains", "bullish", "growth", "record",
    "upgrade", "strong", "profit", "soar", "outperform",
];
const NEGATIVE_WORDS: &[&str] = &[
    "plunge", "miss", "misses", "loss", "losses", "bearish", "downgrade", "weak",
    "crash", "fraud", "recession", "selloff", "cut", "warning",
];
const SYMBOL_STOPWORDS: &[&str] = &[
    "A", "I", "AI", "CEO", "CFO", "IPO", "ETF", "US", "USA", "GDP", "SEC", "FED", "THE",
    "FOR", "AND", "NEW", "NOW",
];

#[async_trait]
impl ContentAnalyzer for KeywordAnalyzer {
    async fn analyze(&self, text: &str) -> anyhow::Result<ContentAnalysis> {
        let mut positive = 0u32;
        let mut negative = 0u32;
        let mut symbols = Vec::new();
        let mut keywords = Vec::new();

        for token in text.split_whitespace() {
            let word = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '$');
            if word.is_empty() {
                continue;
            }

            let lower = word.to_lowercase();
            if POSITIVE_WORDS.contains(&lower.as_str()) {
                positive += 1;
            } else if NEGATIVE_WORDS.contains(&lower.as_str()) {
                negative += 1;
            }

            // A symbol repeated within one article still counts once, so
            // dedupe on push rather than relying on adjacency
            if let Some(ticker) = word.strip_prefix('$') {
                if (1..=6).contains(&ticker.len())
                    && ticker.chars().all(|c| c.is_ascii_alphabetic())
                {
                    let ticker = ticker.to_uppercase();
                    if !symbols.contains(&ticker) {
                        symbols.push(ticker);
                    }
                }
            } else if (2..=5).contains(&word.len())
                && word.chars().all(|c| c.is_ascii_uppercase())
                && !SYMBOL_STOPWORDS.contains(&word)
                && !symbols.iter().any(|s| s == word)
            {
                symbols.push(word.to_string());
            }

            if lower.len() > 6
                && lower.chars().all(|c| c.is_ascii_alphabetic())
                && !keywords.contains(&lower)
            {
                keywords.push(lower);
            }
        }

        keywords.truncate(10);

        let total = positive + negative;
        let sentiment = if total == 0 {
            0.0
        } else {
            (f64::from(positive) - f64::from(negative)) / f64::from(total)
        };

        Ok(ContentAnalysis {
            sentiment: sentiment.clamp(-1.0, 1.0),
            symbols,
            keywords,
        })
    }
}

type CacheKey = (Option<String>, Horizon);

/// The trend analytics engine
pub struct TrendEngine {
    analyzer: Arc<dyn ContentAnalyzer>,
    sentiment: SentimentBook,
    velocity: Mutex<NewsVelocityTracker>,
    cache: Mutex<HashMap<CacheKey, (Instant, TrendReport)>>,
    publisher: EventPublisher,
    config: AnalyticsConfig,
}

impl TrendEngine {
    pub fn new(
        analyzer: Arc<dyn ContentAnalyzer>,
        publisher: EventPublisher,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            analyzer,
            sentiment: SentimentBook::new(),
            velocity: Mutex::new(NewsVelocityTracker::new()),
            cache: Mutex::new(HashMap::new()),
            publisher,
            config,
        }
    }

    /// Ingest one piece of content.
    ///
    /// Runs the NLP collaborator, folds each mentioned symbol into its
    /// tracker, counts the article into the velocity ring, and emits a
    /// low-latency real-time update when a symbol's sentiment swings past
    /// the configured threshold. An NLP failure degrades to a neutral
    /// analysis; the article is still counted.
    #[instrument(skip(self, text), fields(content_id = %content_id, source = %source))]
    pub async fn process_content(
        &self,
        content_id: &str,
        text: &str,
        source: &str,
        categories: &[String],
    ) -> ContentAnalysis {
        let analysis = match self.analyzer.analyze(text).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Content analysis failed for {}: {}", content_id, e);
                ContentAnalysis::neutral()
            }
        };

        self.velocity.lock().record(Utc::now(), source, categories);

        for symbol in &analysis.symbols {
            let update = self.sentiment.update(
                symbol,
                analysis.sentiment,
                source,
                &analysis.keywords,
                self.config.ema_smoothing,
            );
            if update.change.abs() > self.config.swing_threshold {
                debug!(
                    "Sentiment swing on {}: {:+.3} -> {:+.3}",
                    symbol, update.previous, update.current
                );
                self.publisher.publish(AnalysisEvent::TrendRealTimeUpdate {
                    symbol: symbol.clone(),
                    previous_sentiment: update.previous,
                    current_sentiment: update.current,
                    change: update.change,
                    volume: update.volume,
                });
            }
        }

        analysis
    }

    /// Run a full detection pass, serving from the 5-minute cache when warm.
    ///
    /// If the composite alert level is above `low`, a `trend_detected` event
    /// is published carrying only trends above the confidence threshold.
    pub fn detect_trends(&self, symbol: Option<&str>, horizon: Horizon) -> TrendReport {
        let key: CacheKey = (symbol.map(|s| s.to_uppercase()), horizon);
        if let Some((cached_at, report)) = self.cache.lock().get(&key) {
            if cached_at.elapsed() < self.config.cache_ttl {
                return report.clone();
            }
        }

        let now = Utc::now();
        let scope_points = self.scope_points(symbol);

        // Five independent analyses; each degrades to neutral on failure.
        let trends = self
            .detect_trend_signals(symbol, horizon, now)
            .unwrap_or_else(|e| {
                warn!("Trend detection degraded: {}", e);
                Vec::new()
            });
        let momentum = self.momentum(&scope_points, now).unwrap_or_else(|e| {
            warn!("Momentum analysis degraded: {}", e);
            MomentumAnalysis::neutral()
        });
        let sentiment = self.social_sentiment().unwrap_or_else(|e| {
            warn!("Sentiment aggregate degraded: {}", e);
            SocialSentimentTrend::neutral()
        });
        let news_velocity = self.velocity_metrics(now).unwrap_or_else(|e| {
            warn!("Velocity metrics degraded: {}", e);
            NewsVelocityMetrics::neutral()
        });
        let patterns = self.patterns(&scope_points, now).unwrap_or_else(|e| {
            warn!("Pattern recognition degraded: {}", e);
            Vec::new()
        });

        let alert_score = self.alert_score(&trends, &momentum, &sentiment, &news_velocity);
        let alert_level = AlertLevel::from_score(alert_score);

        let report = TrendReport {
            generated_at: now,
            symbol: key.0.clone(),
            trends,
            momentum,
            sentiment,
            news_velocity,
            patterns,
            alert_level,
            alert_score,
        };

        {
            // Sweep expired entries on every insert so one-off symbol
            // queries cannot grow the cache without bound
            let mut cache = self.cache.lock();
            cache.retain(|_, (cached_at, _)| cached_at.elapsed() < self.config.cache_ttl);
            cache.insert(key, (Instant::now(), report.clone()));
        }

        if alert_level != AlertLevel::Low {
            let mut emitted = report.clone();
            emitted
                .trends
                .retain(|t| t.confidence > self.config.confidence_threshold);
            info!(
                "Trend alert ({}) with score {:.2}",
                alert_level, alert_score
            );
            self.publisher
                .publish(AnalysisEvent::TrendDetected { report: emitted });
        }

        report
    }

    /// Scheduler entry point: the five-minute market-wide sweep
    pub fn sweep(&self) {
        let report = self.detect_trends(None, Horizon::Medium);
        debug!(
            "Analytics sweep: {} trends, alert {}",
            report.trends.len(),
            report.alert_level
        );
    }

    /// Scheduler entry point: hourly tracker eviction, report cache included
    pub fn evict_stale(&self) {
        let evicted = self.sentiment.evict_stale(self.config.tracker_ttl);
        if evicted > 0 {
            info!("Evicted {} idle sentiment trackers", evicted);
        }
        self.cache
            .lock()
            .retain(|_, (cached_at, _)| cached_at.elapsed() < self.config.cache_ttl);
    }

    pub fn tracked_symbols(&self) -> Vec<String> {
        self.sentiment.tracked_symbols()
    }

    fn scope_points(&self, symbol: Option<&str>) -> Vec<TrendPoint> {
        match symbol {
            Some(symbol) => self.sentiment.points(symbol),
            None => self.sentiment.merged_points(),
        }
    }

    fn detect_trend_signals(
        &self,
        symbol: Option<&str>,
        horizon: Horizon,
        now: DateTime<Utc>,
    ) -> GatewayResult<Vec<DetectedTrend>> {
        let symbols = match symbol {
            Some(symbol) => vec![symbol.to_uppercase()],
            None => self.sentiment.tracked_symbols(),
        };

        let mut trends = Vec::new();
        for symbol in symbols {
            let points = self.sentiment.points(&symbol);
            let window = TrendWindow::from_points(&points, now);
            let series = match horizon {
                Horizon::Short => &window.short,
                Horizon::Medium => &window.medium,
                Horizon::Long => &window.long,
            };
            let s = slope(series);
            if s.abs() < FLAT_SLOPE {
                continue;
            }
            trends.push(DetectedTrend {
                symbol,
                kind: TrendKind::Sentiment,
                direction: if s > 0.0 {
                    TrendDirection::Bullish
                } else {
                    TrendDirection::Bearish
                },
                strength: (s.abs() * series.len() as f64).min(1.0),
                confidence: (series.len() as f64 / 20.0).min(1.0),
            });
        }

        // Market-wide volume trend from the velocity ring
        let metrics = self.velocity_metrics(now)?;
        if metrics.velocity_change > VELOCITY_SURGE {
            trends.push(DetectedTrend {
                symbol: MARKET_SYMBOL.to_string(),
                kind: TrendKind::Volume,
                direction: TrendDirection::Neutral,
                strength: (metrics.velocity_change / 3.0).min(1.0),
                confidence: 0.75,
            });
        }

        Ok(trends)
    }

    /// Weighted multi-horizon momentum: 0.5 short, 0.3 medium, 0.2 long;
    /// acceleration is (short - medium) - (medium - long). All horizon
    /// values and the blend are clamped to [-1, 1].
    fn momentum(
        &self,
        points: &[TrendPoint],
        now: DateTime<Utc>,
    ) -> GatewayResult<MomentumAnalysis> {
        let window = TrendWindow::from_points(points, now);

        // Scale each slope by its series length: the projected move across
        // the whole window, clamped to the sentiment range.
        let horizon_momentum = |series: &[f64]| -> f64 {
            (slope(series) * series.len() as f64).clamp(-1.0, 1.0)
        };
        let short = horizon_momentum(&window.short);
        let medium = horizon_momentum(&window.medium);
        let long = horizon_momentum(&window.long);

        let overall = (0.5 * short + 0.3 * medium + 0.2 * long).clamp(-1.0, 1.0);
        let acceleration = (short - medium) - (medium - long);

        Ok(MomentumAnalysis {
            short_term: short,
            medium_term: medium,
            long_term: long,
            overall,
            acceleration,
        })
    }

    fn social_sentiment(&self) -> GatewayResult<SocialSentimentTrend> {
        Ok(self.sentiment.aggregate())
    }

    fn velocity_metrics(&self, now: DateTime<Utc>) -> GatewayResult<NewsVelocityMetrics> {
        Ok(self.velocity.lock().metrics(now))
    }

    fn patterns(
        &self,
        points: &[TrendPoint],
        now: DateTime<Utc>,
    ) -> GatewayResult<Vec<RecognizedPattern>> {
        Ok(TrendWindow::from_points(points, now).detect_patterns())
    }

    /// Composite alert score from the five analyses
    fn alert_score(
        &self,
        trends: &[DetectedTrend],
        momentum: &MomentumAnalysis,
        sentiment: &SocialSentimentTrend,
        velocity: &NewsVelocityMetrics,
    ) -> f64 {
        let w = &self.config;
        let strong_trends = trends
            .iter()
            .filter(|t| t.confidence > 0.7 && t.strength > 0.5)
            .count() as f64;

        let mut score = w.weight_trends * strong_trends
            + w.weight_momentum * momentum.overall.abs()
            + w.weight_acceleration * momentum.acceleration.abs();
        if sentiment.trending {
            score += w.weight_sentiment * sentiment.sentiment_change.abs();
        }
        if velocity.velocity_change > VELOCITY_SURGE {
            score += w.weight_velocity;
        }
        score
    }
}

impl std::fmt::Debug for TrendEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrendEngine")
            .field("tracked_symbols", &self.sentiment.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    struct FailingAnalyzer;

    #[async_trait]
    impl ContentAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _text: &str) -> anyhow::Result<ContentAnalysis> {
            anyhow::bail!("nlp backend unavailable")
        }
    }

    fn engine_with_hub() -> (TrendEngine, tokio::sync::mpsc::Receiver<AnalysisEvent>) {
        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let engine = TrendEngine::new(
            Arc::new(KeywordAnalyzer),
            EventPublisher::from_sender(tx),
            AnalyticsConfig::default(),
        );
        (engine, rx)
    }

    #[tokio::test]
    async fn keyword_analyzer_extracts_symbols_and_sentiment() {
        let analysis = KeywordAnalyzer
            .analyze("$AAPL shares surge after record profit; TSLA rally continues")
            .await
            .unwrap();
        assert!(analysis.symbols.contains(&"AAPL".to_string()));
        assert!(analysis.symbols.contains(&"TSLA".to_string()));
        assert!(analysis.sentiment > 0.9);
    }

    #[tokio::test]
    async fn swing_past_threshold_emits_real_time_update() {
        let (engine, mut rx) = engine_with_hub();

        // Establish a negative baseline, then hit it with strong positives
        engine
            .process_content("c1", "$NVDA plunge on weak outlook", "wire", &[])
            .await;
        engine
            .process_content("c2", "$NVDA surge rally record profit", "wire", &[])
            .await;

        let mut swings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AnalysisEvent::TrendRealTimeUpdate { symbol, change, .. } = event {
                swings.push((symbol, change));
            }
        }
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].0, "NVDA");
        // -1 baseline smoothed toward +1: change of 0.2 * 2.0
        assert!(swings[0].1 > 0.15);
    }

    #[tokio::test]
    async fn small_moves_do_not_emit_real_time_updates() {
        let (engine, mut rx) = engine_with_hub();
        engine
            .process_content("c1", "$MSFT gain today", "wire", &[])
            .await;
        engine
            .process_content("c2", "$MSFT gain again", "wire", &[])
            .await;
        // Second update moves sentiment from 1.0 toward 1.0: no swing
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn failing_analyzer_degrades_to_neutral_but_counts_velocity() {
        let (tx, _rx) = tokio::sync::mpsc::channel(16);
        let engine = TrendEngine::new(
            Arc::new(FailingAnalyzer),
            EventPublisher::from_sender(tx),
            AnalyticsConfig::default(),
        );

        let analysis = engine
            .process_content("c1", "whatever", "wire", &["markets".to_string()])
            .await;
        assert_eq!(analysis.sentiment, 0.0);
        assert!(analysis.symbols.is_empty());

        let report = engine.detect_trends(None, Horizon::Medium);
        assert_eq!(report.news_velocity.total_24h, 1);
    }

    #[tokio::test]
    async fn detect_trends_serves_from_cache_within_ttl() {
        let (engine, _rx) = engine_with_hub();
        engine
            .process_content("c1", "$AMD surge record", "wire", &[])
            .await;

        let first = engine.detect_trends(None, Horizon::Medium);
        engine
            .process_content("c2", "$AMD plunge crash", "wire", &[])
            .await;
        let second = engine.detect_trends(None, Horizon::Medium);
        // Same generated_at: the cached report was returned unchanged
        assert_eq!(first.generated_at, second.generated_at);
    }

    #[tokio::test]
    async fn quiet_market_scores_low_and_emits_nothing() {
        let (engine, mut rx) = engine_with_hub();
        let report = engine.detect_trends(None, Horizon::Medium);
        assert_eq!(report.alert_level, AlertLevel::Low);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn repeated_symbol_mentions_count_once_per_article() {
        let analysis = KeywordAnalyzer
            .analyze("$AAPL beats while MSFT dips and AAPL gains")
            .await
            .unwrap();
        assert_eq!(
            analysis.symbols,
            vec!["AAPL".to_string(), "MSFT".to_string()]
        );
    }

    #[tokio::test]
    async fn momentum_blends_horizons_with_fixed_weights() {
        let (engine, _rx) = engine_with_hub();
        let now = Utc::now();

        // Four flat points around three hours old, then a linear climb
        // within the last hour
        let mut points = Vec::new();
        for i in 0..4i64 {
            points.push(TrendPoint {
                at: now - chrono::Duration::hours(3) + chrono::Duration::minutes(10 * i),
                value: 0.0,
            });
        }
        for i in 0..4i64 {
            points.push(TrendPoint {
                at: now - chrono::Duration::minutes(50 - 10 * i),
                value: 0.2 * i as f64,
            });
        }

        let momentum = engine.momentum(&points, now).unwrap();

        // Short window: slope 0.2 over 4 points
        assert!((momentum.short_term - 0.8).abs() < 1e-9);
        // Medium and long see the same 8-point series: slope 27.2/336
        assert!((momentum.medium_term - 68.0 / 105.0).abs() < 1e-9);
        assert!((momentum.long_term - 68.0 / 105.0).abs() < 1e-9);
        // 0.5 short + 0.3 medium + 0.2 long
        assert!((momentum.overall - 76.0 / 105.0).abs() < 1e-9);
        // (short - medium) - (medium - long)
        assert!((momentum.acceleration - 16.0 / 105.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn momentum_horizons_are_clamped_to_unit_range() {
        let (engine, _rx) = engine_with_hub();
        let now = Utc::now();

        // Slope 1.0 over 10 points projects far past the sentiment range
        let points: Vec<TrendPoint> = (0..10i64)
            .map(|i| TrendPoint {
                at: now - chrono::Duration::minutes(50 - 5 * i),
                value: i as f64,
            })
            .collect();

        let momentum = engine.momentum(&points, now).unwrap();
        assert_eq!(momentum.short_term, 1.0);
        assert!((momentum.overall - 1.0).abs() < 1e-12);
        assert!(momentum.acceleration.abs() < 1e-12);
    }

    #[tokio::test]
    async fn expired_report_cache_entries_are_swept() {
        let (tx, _rx) = tokio::sync::mpsc::channel(64);
        let config = AnalyticsConfig {
            cache_ttl: std::time::Duration::ZERO,
            ..AnalyticsConfig::default()
        };
        let engine = TrendEngine::new(
            Arc::new(KeywordAnalyzer),
            EventPublisher::from_sender(tx),
            config,
        );

        // Every pass inserts a fresh key; expired ones must not pile up
        for i in 0..10 {
            engine.detect_trends(Some(&format!("SYM{}", i)), Horizon::Medium);
        }
        assert!(engine.cache.lock().len() <= 1);

        engine.evict_stale();
        assert!(engine.cache.lock().is_empty());
    }
}
