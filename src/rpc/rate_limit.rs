//! Token bucket shared by every call to one endpoint.

use std::sync::Mutex;
use std::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::rpc::{RpcError, RpcResult};

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Fail-fast limiter: an empty bucket refuses the call instead of queuing it.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_size.max(1) as f64;
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity)),
            capacity,
            refill_rate: config.requests_per_second as f64,
        }
    }

    /// Take one token for `method` or fail with `RateLimitExceeded`.
    pub fn acquire(&self, method: &'static str) -> RpcResult<()> {
        let granted = match self.bucket.lock() {
            Ok(mut bucket) => bucket.try_acquire(self.capacity, self.refill_rate),
            // A panic while holding the lock cannot leave the bucket half-updated.
            Err(poisoned) => poisoned
                .into_inner()
                .try_acquire(self.capacity, self.refill_rate),
        };

        if granted {
            Ok(())
        } else {
            tracing::warn!(method, "RPC rate limit exceeded");
            metrics::record_rate_limited(method);
            Err(RpcError::RateLimitExceeded { method })
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .finish()
    }
}
