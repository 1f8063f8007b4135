//! Fixed-window admission control, one token bucket per client key.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Token count and window end for a single client.
#[derive(Debug, Clone)]
struct RateBucket {
    tokens: u32,
    reset_at: DateTime<Utc>,
}

/// Per-client rate limiter. A full hour window refills the bucket to the
/// configured capacity; each allowed call consumes one token.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, RateBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if the client may proceed, consuming one token.
    pub fn allow(&self, client_key: &str, limit_per_hour: u32) -> bool {
        self.allow_at(client_key, limit_per_hour, Utc::now())
    }

    /// Clock-injected variant used by `allow` and by tests.
    pub fn allow_at(&self, client_key: &str, limit_per_hour: u32, now: DateTime<Utc>) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Rate limiter lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        let bucket = buckets
            .entry(client_key.to_string())
            .or_insert_with(|| RateBucket {
                tokens: limit_per_hour,
                reset_at: now + Duration::hours(1),
            });

        if now > bucket.reset_at {
            bucket.tokens = limit_per_hour;
            bucket.reset_at = now + Duration::hours(1);
        }

        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
