//! Per-user flood limiting (token bucket).
//!
//! The transport is public: anyone can message the bot. A user over the
//! limit is dropped for the turn (with an audit entry), not queued.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserKey;

#[derive(Clone, Copy, Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

#[derive(Clone, Debug)]
pub struct FloodLimiter {
    enabled: bool,
    capacity: f64,
    refill_per_sec: f64,
    buckets: HashMap<UserKey, Bucket>,
}

impl FloodLimiter {
    pub fn new(enabled: bool, requests: u32, window: Duration) -> Self {
        let capacity = requests as f64;
        Self {
            enabled,
            capacity,
            refill_per_sec: capacity / window.as_secs_f64().max(1e-9),
            buckets: HashMap::new(),
        }
    }

    pub fn allow(&mut self, user: &UserKey) -> bool {
        self.allow_at(user, Instant::now())
    }

    pub fn allow_at(&mut self, user: &UserKey, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let bucket = self.buckets.entry(user.clone()).or_insert(Bucket {
            tokens: self.capacity,
            refilled_at: now,
        });

        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.refilled_at = now;

        if bucket.tokens < 1.0 {
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }
}
