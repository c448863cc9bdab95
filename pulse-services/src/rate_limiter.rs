//! Per-connection token-bucket rate limiting
//!
//! Each connection owns one bucket; a command is admitted only if a token is
//! available. The scheduler refills every bucket on a fixed tick. This gates
//! inbound commands only; outbound fan-out pressure is the dispatcher's job.

pub use crate::config::RateLimitConfig;

/// A token bucket for one connection.
///
/// Tokens are a `u32` with a guarded decrement, so the count can never go
/// negative and never exceeds `max_tokens`.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucket {
    tokens: u32,
    max_tokens: u32,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn full(max_tokens: u32) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
        }
    }

    /// Take one token. Returns `false` (and consumes nothing) when empty.
    pub fn try_consume(&mut self) -> bool {
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    /// Add `rate` tokens, saturating at the bucket capacity
    pub fn refill(&mut self, rate: u32) {
        self.tokens = self.tokens.saturating_add(rate).min(self.max_tokens);
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_stops_at_zero() {
        let mut bucket = TokenBucket::full(3);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens(), 0);
        // A second failed consume still leaves the count at zero
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens(), 0);
    }

    #[test]
    fn refill_saturates_at_capacity() {
        let mut bucket = TokenBucket::full(100);
        for _ in 0..95 {
            assert!(bucket.try_consume());
        }
        assert_eq!(bucket.tokens(), 5);
        bucket.refill(10);
        assert_eq!(bucket.tokens(), 15);
        bucket.refill(1000);
        assert_eq!(bucket.tokens(), 100);
    }

    #[test]
    fn tokens_stay_within_bounds_through_mixed_traffic() {
        let mut bucket = TokenBucket::full(10);
        for round in 0..50 {
            if round % 3 == 0 {
                bucket.refill(4);
            }
            bucket.try_consume();
            assert!(bucket.tokens() <= bucket.max_tokens());
        }
    }
}
