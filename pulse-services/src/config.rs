//! Gateway configuration
//!
//! Every tunable the gateway uses lives here with its default. The numeric
//! analytics constants (EMA smoothing, swing threshold, alert weights) are
//! product calibration, not derived values; they are configuration so a
//! deployment can adjust them without a rebuild.

use std::time::Duration;

/// Token-bucket rate limiting per connection
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Bucket capacity
    pub max_tokens: u32,
    /// Tokens added per refill tick
    pub refill_rate: u32,
    /// Interval between refill ticks
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            refill_rate: 10,
            refill_interval: Duration::from_secs(60),
        }
    }
}

/// Outbound dispatch behavior
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Non-critical fan-out is bounded to chunks of this size
    pub chunk_size: usize,
    /// Per-connection outbound channel depth
    pub channel_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            channel_buffer: 100,
        }
    }
}

/// Trend analytics calibration
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsConfig {
    /// EMA weight given to the incoming observation (old keeps 1 - this)
    pub ema_smoothing: f64,
    /// |sentiment change| above which a real-time update is emitted
    pub swing_threshold: f64,
    /// Trends below this confidence are dropped from emitted reports
    pub confidence_threshold: f64,
    /// Detection results are cached this long
    pub cache_ttl: Duration,
    /// Sentiment trackers idle longer than this are evicted
    pub tracker_ttl: Duration,
    /// Alert score weight for strong high-confidence trends
    pub weight_trends: f64,
    /// Alert score weight for |overall momentum|
    pub weight_momentum: f64,
    /// Alert score weight for |momentum acceleration|
    pub weight_acceleration: f64,
    /// Alert score weight for |sentiment change| while trending
    pub weight_sentiment: f64,
    /// Flat alert score bonus when news velocity change exceeds 1.5x
    pub weight_velocity: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            ema_smoothing: 0.2,
            swing_threshold: 0.15,
            confidence_threshold: 0.6,
            cache_ttl: Duration::from_secs(300),
            tracker_ttl: Duration::from_secs(24 * 3600),
            weight_trends: 0.25,
            weight_momentum: 0.3,
            weight_acceleration: 0.2,
            weight_sentiment: 0.4,
            weight_velocity: 0.3,
        }
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum concurrently registered connections
    pub max_connections: usize,
    /// Connections idle longer than this are reaped
    pub idle_window: Duration,
    pub rate_limit: RateLimitConfig,
    pub dispatch: DispatchConfig,
    pub analytics: AnalyticsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            idle_window: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            dispatch: DispatchConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `PULSE_MAX_CONNECTIONS`, `PULSE_IDLE_SECS`,
    /// `PULSE_MAX_TOKENS`, `PULSE_REFILL_RATE`, `PULSE_CHUNK_SIZE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<usize>("PULSE_MAX_CONNECTIONS") {
            config.max_connections = v;
        }
        if let Some(v) = env_parse::<u64>("PULSE_IDLE_SECS") {
            config.idle_window = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u32>("PULSE_MAX_TOKENS") {
            config.rate_limit.max_tokens = v;
        }
        if let Some(v) = env_parse::<u32>("PULSE_REFILL_RATE") {
            config.rate_limit.refill_rate = v;
        }
        if let Some(v) = env_parse::<usize>("PULSE_CHUNK_SIZE") {
            config.dispatch.chunk_size = v;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
