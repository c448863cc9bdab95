//! News velocity tracking
//!
//! Process-wide singleton counting analyzed articles into a 24-slot hourly
//! circular buffer, with per-source and per-category counters and the peak
//! hourly rate. Slots are reset one by one as the clock rolls over them;
//! the tracker itself lives for the whole process.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use pulse_core::NewsVelocityMetrics;

const SLOTS: usize = 24;

/// Hourly article-count ring plus running totals
#[derive(Debug)]
pub struct NewsVelocityTracker {
    slots: [u32; SLOTS],
    /// Absolute hour number (unix time / 3600) the ring was last advanced to
    last_hour: Option<i64>,
    total: u64,
    per_category: HashMap<String, u64>,
    per_source: HashMap<String, u64>,
    peak_velocity: u32,
}

impl Default for NewsVelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsVelocityTracker {
    pub fn new() -> Self {
        Self {
            slots: [0; SLOTS],
            last_hour: None,
            total: 0,
            per_category: HashMap::new(),
            per_source: HashMap::new(),
            peak_velocity: 0,
        }
    }

    fn hour_number(at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(3600)
    }

    /// Zero every slot the clock has rolled past since the last advance
    fn advance(&mut self, hour: i64) {
        match self.last_hour {
            None => self.last_hour = Some(hour),
            Some(last) if hour > last => {
                let gap = (hour - last).min(SLOTS as i64);
                for step in 1..=gap {
                    let idx = (last + step).rem_euclid(SLOTS as i64) as usize;
                    self.slots[idx] = 0;
                }
                self.last_hour = Some(hour);
            }
            Some(_) => {}
        }
    }

    /// Count one analyzed article at `at`
    pub fn record(&mut self, at: DateTime<Utc>, source: &str, categories: &[String]) {
        let hour = Self::hour_number(at);
        self.advance(hour);

        let idx = hour.rem_euclid(SLOTS as i64) as usize;
        self.slots[idx] += 1;
        self.total += 1;
        if self.slots[idx] > self.peak_velocity {
            self.peak_velocity = self.slots[idx];
        }

        *self.per_source.entry(source.to_string()).or_default() += 1;
        for category in categories {
            *self.per_category.entry(category.clone()).or_default() += 1;
        }
    }

    /// Snapshot the current-hour rate against the rolling 24h picture
    pub fn metrics(&mut self, now: DateTime<Utc>) -> NewsVelocityMetrics {
        let hour = Self::hour_number(now);
        self.advance(hour);

        let idx = hour.rem_euclid(SLOTS as i64) as usize;
        let current_hour = self.slots[idx];
        let total_24h: u64 = self.slots.iter().map(|&c| u64::from(c)).sum();
        let hourly_average = total_24h as f64 / SLOTS as f64;

        let velocity_change = if hourly_average > 0.0 {
            f64::from(current_hour) / hourly_average
        } else if current_hour > 0 {
            f64::from(current_hour)
        } else {
            0.0
        };

        NewsVelocityMetrics {
            current_hour,
            hourly_average,
            velocity_change,
            peak_velocity: self.peak_velocity,
            total_24h,
        }
    }

    pub fn source_counts(&self) -> &HashMap<String, u64> {
        &self.per_source
    }

    pub fn category_counts(&self) -> &HashMap<String, u64> {
        &self.per_category
    }

    /// Lifetime article count (never reset)
    pub fn total(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn counts_accumulate_within_an_hour() {
        let mut tracker = NewsVelocityTracker::new();
        tracker.record(at_hour(9, 0), "reuters", &["markets".to_string()]);
        tracker.record(at_hour(9, 30), "bloomberg", &[]);
        tracker.record(at_hour(9, 59), "reuters", &[]);

        let metrics = tracker.metrics(at_hour(9, 59));
        assert_eq!(metrics.current_hour, 3);
        assert_eq!(metrics.total_24h, 3);
        assert_eq!(metrics.peak_velocity, 3);
        assert_eq!(tracker.source_counts()["reuters"], 2);
        assert_eq!(tracker.category_counts()["markets"], 1);
    }

    #[test]
    fn hour_rollover_resets_the_new_slot_only() {
        let mut tracker = NewsVelocityTracker::new();
        for _ in 0..5 {
            tracker.record(at_hour(9, 10), "x", &[]);
        }
        tracker.record(at_hour(10, 5), "x", &[]);

        let metrics = tracker.metrics(at_hour(10, 5));
        assert_eq!(metrics.current_hour, 1);
        // The 9 o'clock slot still counts toward the 24h total
        assert_eq!(metrics.total_24h, 6);
        assert_eq!(metrics.peak_velocity, 5);
    }

    #[test]
    fn slot_from_previous_day_is_cleared_on_wrap() {
        let mut tracker = NewsVelocityTracker::new();
        for _ in 0..4 {
            tracker.record(at_hour(9, 0), "x", &[]);
        }
        // 24 hours later the same slot index comes around again
        let next_day = at_hour(9, 0) + chrono::Duration::hours(24);
        tracker.record(next_day, "x", &[]);

        let metrics = tracker.metrics(next_day);
        assert_eq!(metrics.current_hour, 1);
        assert_eq!(metrics.total_24h, 1);
        // Peak and lifetime totals survive slot resets
        assert_eq!(metrics.peak_velocity, 4);
        assert_eq!(tracker.total(), 5);
    }

    #[test]
    fn velocity_change_compares_current_hour_to_average() {
        let mut tracker = NewsVelocityTracker::new();
        // Spread 24 articles over the previous 24 hours, then burst
        let start = at_hour(0, 0);
        for h in 0..24 {
            tracker.record(start + chrono::Duration::hours(h), "x", &[]);
        }
        let burst_at = start + chrono::Duration::hours(23);
        for _ in 0..11 {
            tracker.record(burst_at, "x", &[]);
        }

        let metrics = tracker.metrics(burst_at);
        assert_eq!(metrics.current_hour, 12);
        // 35 articles over 24 slots
        assert!((metrics.hourly_average - 35.0 / 24.0).abs() < 1e-9);
        assert!(metrics.velocity_change > 1.5);
    }

    #[test]
    fn empty_tracker_reports_neutral_metrics() {
        let mut tracker = NewsVelocityTracker::new();
        let metrics = tracker.metrics(at_hour(12, 0));
        assert_eq!(metrics.current_hour, 0);
        assert_eq!(metrics.velocity_change, 0.0);
        assert_eq!(metrics.total_24h, 0);
    }
}
