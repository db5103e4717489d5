//! Token-bucket limiter gating every venue request.
//!
//! Each call acquires tokens equal to its endpoint weight and awaits
//! until the bucket can serve them. Counters for total requests, waits
//! and cumulative wait time feed the gateway health check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub total_waits: u64,
    pub total_wait_ms: u64,
}

impl RateLimiterStats {
    pub fn average_wait_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_wait_ms as f64 / self.total_requests as f64
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    name: String,
    capacity: f64,
    /// Tokens added per second.
    refill_rate: f64,
    state: Mutex<BucketState>,
    total_requests: AtomicU64,
    total_waits: AtomicU64,
    total_wait_ms: AtomicU64,
}

impl TokenBucket {
    /// A bucket refilling at `rate_per_sec` with a burst capacity of one
    /// second's worth of tokens.
    pub fn new(name: impl Into<String>, rate_per_sec: f64) -> Self {
        let capacity = rate_per_sec.max(1.0);
        Self {
            name: name.into(),
            capacity,
            refill_rate: rate_per_sec.max(0.1),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            total_requests: AtomicU64::new(0),
            total_waits: AtomicU64::new(0),
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Blocks until `weight` tokens are available, then consumes them.
    pub async fn acquire(&self, weight: u32) {
        let weight = weight.max(1) as f64;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let mut waited = false;

        loop {
            let sleep_for = {
                let mut state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= weight {
                    state.tokens -= weight;
                    None
                } else {
                    let deficit = weight - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_rate))
                }
            };

            match sleep_for {
                None => break,
                Some(delay) => {
                    if !waited {
                        waited = true;
                        self.total_waits.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            "RateLimiter [{}]: throttling for {:?} (weight {})",
                            self.name, delay, weight
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }

        if waited {
            self.total_wait_ms
                .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_waits: self.total_waits.load(Ordering::Relaxed),
            total_wait_ms: self.total_wait_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_within_capacity_does_not_wait() {
        let bucket = TokenBucket::new("test", 10.0);
        let start = Instant::now();
        for _ in 0..10 {
            bucket.acquire(1).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(bucket.stats().total_requests, 10);
        assert_eq!(bucket.stats().total_waits, 0);
    }

    #[tokio::test]
    async fn test_exhausted_bucket_throttles() {
        let bucket = TokenBucket::new("test", 10.0);
        // Drain the burst capacity, then one more must wait ~100ms.
        bucket.acquire(10).await;
        let start = Instant::now();
        bucket.acquire(1).await;
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(bucket.stats().total_waits, 1);
        assert!(bucket.stats().total_wait_ms > 0);
    }

    #[tokio::test]
    async fn test_weighted_acquire() {
        let bucket = TokenBucket::new("test", 20.0);
        bucket.acquire(20).await;
        let start = Instant::now();
        // Weight 5 at 20/s needs ~250ms of refill.
        bucket.acquire(5).await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
