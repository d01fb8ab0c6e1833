//! Rate Limiting
//!
//! Token bucket rate limiter keyed by client. Before registration a
//! connection is keyed by peer address, afterwards by phone number, so
//! one abusive phone cannot dodge the limit by reconnecting.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Token bucket for a single key.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    /// Tokens added per second.
    refill_rate: f64,
    /// Last refill or consume attempt.
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_rate: f64) -> Self {
        TokenBucket {
            tokens: max_tokens as f64,
            max_tokens: max_tokens as f64,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_update = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.duration_since(self.last_update)
    }
}

/// Rate limiter over many keys.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, TokenBucket>>,
    /// Maximum events per minute per key.
    max_per_minute: u32,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        RateLimiter {
            buckets: RwLock::new(HashMap::new()),
            max_per_minute,
        }
    }

    /// Tries to consume a token for this key.
    ///
    /// Returns true if allowed, false if rate limited.
    pub fn consume(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().unwrap();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| {
            TokenBucket::new(self.max_per_minute, self.max_per_minute as f64 / 60.0)
        });
        bucket.try_consume()
    }

    /// Drops buckets untouched for longer than `max_idle`.
    ///
    /// Returns the number of buckets removed.
    pub fn cleanup_inactive(&self, max_idle: Duration) -> usize {
        let mut buckets = self.buckets.write().unwrap();
        let now = Instant::now();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.idle_for(now) < max_idle);
        before - buckets.len()
    }

    /// Number of keys currently tracked.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().unwrap().len()
    }
}
