//! Token-bucket rate limiter keyed by caller identity.
//!
//! Generalizes this codebase's `RateLimiter`/`TokenBucket` (fixed
//! tool-name-keyed buckets with a plain `Instant`-based refill) into a
//! per-caller-identity bucket map with TTL and max-cardinality eviction,
//! and a pluggable clock so tests can advance time deterministically
//! instead of sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only advances when told to, for tests exercising the
/// boundary behaviors ("after ticking `1000/r` ms, it returns true").
pub struct ManualClock {
    current: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { current: Mutex::new(Instant::now()) })
    }

    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap()
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    created_at: Instant,
}

pub struct RateLimiterConfig {
    pub capacity: u32,
    pub refill_per_second: f64,
    pub ttl: Duration,
    pub max_cardinality: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 60,
            refill_per_second: 1.0,
            ttl: Duration::from_secs(3600),
            max_cardinality: 10_000,
        }
    }
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), config, clock: Arc::new(RealClock) }
    }

    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), config, clock }
    }

    fn evict_expired(&self, buckets: &mut HashMap<String, Bucket>, now: Instant) {
        buckets.retain(|_, bucket| now.duration_since(bucket.created_at) < self.config.ttl);
    }

    fn evict_oldest(&self, buckets: &mut HashMap<String, Bucket>) {
        while buckets.len() > self.config.max_cardinality {
            if let Some(oldest_key) = buckets
                .iter()
                .min_by_key(|(_, b)| b.created_at)
                .map(|(k, _)| k.clone())
            {
                buckets.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    /// Refills `min(capacity, tokens + elapsed*refillPerSecond)` then
    /// attempts to decrement by `n`. Returns `false` without decrementing
    /// when insufficient tokens remain.
    pub fn consume(&self, key: &str, n: u32) -> bool {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock().unwrap();
        self.evict_expired(&mut buckets, now);

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.capacity as f64,
            last_refill: now,
            created_at: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_second).min(self.config.capacity as f64);
        bucket.last_refill = now;

        let allowed = bucket.tokens >= n as f64;
        if allowed {
            bucket.tokens -= n as f64;
        }

        self.evict_oldest(&mut buckets);
        allowed
    }

    pub fn key_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
