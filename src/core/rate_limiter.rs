//! Per-identifier token-bucket rate limiter: capacity N, greedy refill of
//! the full capacity over 60 s (one token every `60/N` seconds).

use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: u32, refill_per_second: f64) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity as f64);
            self.last_refill = Instant::now();
        }
    }
}

pub struct RateLimiter {
    enabled: bool,
    capacity: u32,
    buckets: DashMap<String, Mutex<Bucket>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, requests_per_minute: u32) -> Self {
        Self {
            enabled,
            capacity: requests_per_minute,
            buckets: DashMap::new(),
        }
    }

    fn refill_per_second(&self) -> f64 {
        self.capacity as f64 / 60.0
    }

    /// Atomically checks for an available token and decrements it if
    /// present. The `remaining` snapshot is taken immediately after the
    /// decrement so a caller never observes a value stale by one request.
    pub fn check_and_record(&self, identifier: &str) -> RateLimitResult {
        if !self.enabled {
            return RateLimitResult {
                allowed: true,
                limit: self.capacity,
                remaining: self.capacity,
                reset_seconds: 0,
            };
        }

        let entry = self
            .buckets
            .entry(identifier.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(self.capacity)));
        let mut bucket = entry.lock().unwrap_or_else(|p| p.into_inner());

        bucket.refill(self.capacity, self.refill_per_second());

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }

        let remaining = bucket.tokens.floor().max(0.0) as u32;
        let reset_seconds = if remaining >= self.capacity {
            0
        } else {
            let missing = (self.capacity - remaining) as f64;
            (missing / self.refill_per_second()).ceil() as u64
        };

        RateLimitResult {
            allowed,
            limit: self.capacity,
            remaining,
            reset_seconds,
        }
    }

    /// Read-only snapshot for the admin endpoint; does not consume a token.
    pub fn snapshot(&self, identifier: &str) -> RateLimitResult {
        if !self.enabled {
            return RateLimitResult {
                allowed: true,
                limit: self.capacity,
                remaining: self.capacity,
                reset_seconds: 0,
            };
        }

        let entry = self
            .buckets
            .entry(identifier.to_string())
            .or_insert_with(|| Mutex::new(Bucket::new(self.capacity)));
        let mut bucket = entry.lock().unwrap_or_else(|p| p.into_inner());
        bucket.refill(self.capacity, self.refill_per_second());

        let remaining = bucket.tokens.floor().max(0.0) as u32;
        RateLimitResult {
            allowed: remaining >= 1,
            limit: self.capacity,
            remaining,
            reset_seconds: if remaining >= self.capacity {
                0
            } else {
                ((self.capacity - remaining) as f64 / self.refill_per_second()).ceil() as u64
            },
        }
    }

    /// Admin operation: wipe an identifier's bucket back to full capacity.
    pub fn reset(&self, identifier: &str) {
        self.buckets
            .insert(identifier.to_string(), Mutex::new(Bucket::new(self.capacity)));
    }
}
