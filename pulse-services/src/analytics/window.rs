//! Time-bounded trend windows and pattern recognition
//!
//! A [`TrendWindow`] slices a sentiment series into short (1h), medium (4h)
//! and long (24h) horizons for a single analysis pass; nothing here is
//! persisted. Slopes use plain least-squares over index-as-x with a guard
//! for zero-variance series.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use pulse_core::{PatternKind, RecognizedPattern, TrendDirection};

/// One observation in a sentiment series
#[derive(Debug, Clone, Copy)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// Breakout trigger: recent-3 average must deviate from the prior average
/// by more than this ratio
const BREAKOUT_RATIO: f64 = 0.10;
/// Slopes below this magnitude are treated as flat
const FLAT_SLOPE: f64 = 1e-4;

/// Three time-bounded views over one series
#[derive(Debug, Default)]
pub struct TrendWindow {
    pub short: Vec<f64>,
    pub medium: Vec<f64>,
    pub long: Vec<f64>,
}

impl TrendWindow {
    /// Slice a time-ordered series into the three horizons
    pub fn from_points(points: &[TrendPoint], now: DateTime<Utc>) -> Self {
        let short_cutoff = now - ChronoDuration::hours(1);
        let medium_cutoff = now - ChronoDuration::hours(4);
        let long_cutoff = now - ChronoDuration::hours(24);

        let mut window = TrendWindow::default();
        for point in points {
            if point.at < long_cutoff || point.at > now {
                continue;
            }
            window.long.push(point.value);
            if point.at >= medium_cutoff {
                window.medium.push(point.value);
            }
            if point.at >= short_cutoff {
                window.short.push(point.value);
            }
        }
        window
    }

    /// Run all three pattern detectors over this window
    pub fn detect_patterns(&self) -> Vec<RecognizedPattern> {
        let mut patterns = Vec::new();
        if let Some(p) = detect_breakout(&self.long) {
            patterns.push(p);
        }
        if let Some(p) = detect_reversal(&self.medium) {
            patterns.push(p);
        }
        if let Some(p) = detect_momentum_acceleration(&self.short, &self.medium) {
            patterns.push(p);
        }
        patterns
    }
}

/// Least-squares slope over index-as-x.
///
/// Returns 0 for series shorter than two points, zero-variance series, or
/// any non-finite intermediate.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64) * (i as f64)).sum();

    let denominator = n_f * sum_x2 - sum_x * sum_x;
    if denominator.abs() < f64::EPSILON {
        return 0.0;
    }
    let result = (n_f * sum_xy - sum_x * sum_y) / denominator;
    if result.is_finite() {
        result
    } else {
        0.0
    }
}

/// Breakout: the average of the last 3 points deviates more than 10% from
/// the average of everything before them.
pub fn detect_breakout(values: &[f64]) -> Option<RecognizedPattern> {
    if values.len() < 4 {
        return None;
    }
    let (prior, recent) = values.split_at(values.len() - 3);
    let recent_avg = recent.iter().sum::<f64>() / recent.len() as f64;
    let prior_avg = prior.iter().sum::<f64>() / prior.len() as f64;
    if prior_avg.abs() < 1e-9 {
        return None;
    }

    let deviation = recent_avg / prior_avg - 1.0;
    if !deviation.is_finite() || deviation.abs() <= BREAKOUT_RATIO {
        return None;
    }

    Some(RecognizedPattern {
        kind: PatternKind::Breakout,
        direction: if recent_avg > prior_avg {
            TrendDirection::Bullish
        } else {
            TrendDirection::Bearish
        },
        magnitude: deviation,
        confidence: (0.5 + deviation.abs()).min(1.0),
    })
}

/// Reversal: the slope sign flips between the first and second half of the
/// medium window.
pub fn detect_reversal(values: &[f64]) -> Option<RecognizedPattern> {
    if values.len() < 6 {
        return None;
    }
    let mid = values.len() / 2;
    let first = slope(&values[..mid]);
    let second = slope(&values[mid..]);
    if first * second >= 0.0 || first.abs() < FLAT_SLOPE || second.abs() < FLAT_SLOPE {
        return None;
    }

    Some(RecognizedPattern {
        kind: PatternKind::Reversal,
        direction: if second > 0.0 {
            TrendDirection::Bullish
        } else {
            TrendDirection::Bearish
        },
        magnitude: (second - first).abs(),
        confidence: (0.5 + (second - first).abs()).min(1.0),
    })
}

/// Momentum acceleration: the short-horizon slope outruns the medium one
pub fn detect_momentum_acceleration(
    short: &[f64],
    medium: &[f64],
) -> Option<RecognizedPattern> {
    let s = slope(short);
    let m = slope(medium);
    if s.abs() <= m.abs() || s.abs() < FLAT_SLOPE {
        return None;
    }

    Some(RecognizedPattern {
        kind: PatternKind::MomentumAcceleration,
        direction: if s > 0.0 {
            TrendDirection::Bullish
        } else {
            TrendDirection::Bearish
        },
        magnitude: s.abs() - m.abs(),
        confidence: (0.5 + (s.abs() - m.abs())).min(1.0),
    })
}
