//! Token-bucket rate limiter for requests against the grading site.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Limits request rate and spaces consecutive requests by a jittered
/// polite delay.
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    min_delay: Duration,
    max_delay: Duration,
}

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.refilled_at = now;
    }
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute`, with each request
    /// preceded by a delay between `min_delay_secs` and `max_delay_secs`.
    pub fn new(requests_per_minute: u32, min_delay_secs: f64, max_delay_secs: f64) -> Self {
        let capacity = requests_per_minute as f64;
        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: capacity,
                capacity,
                refill_per_sec: capacity / 60.0,
                refilled_at: Instant::now(),
            })),
            min_delay: Duration::from_secs_f64(min_delay_secs),
            max_delay: Duration::from_secs_f64(max_delay_secs),
        }
    }

    /// Acquire a token, waiting if necessary
    pub async fn acquire(&self) {
        let delay = {
            let mut bucket = self.bucket.lock().await;
            bucket.refill(Instant::now());

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                let jitter = (self.max_delay - self.min_delay).mul_f64(rand_factor());
                self.min_delay + jitter
            } else {
                // Wait out the refill, then the polite minimum on top
                let wait = (1.0 - bucket.tokens) / bucket.refill_per_sec;
                bucket.tokens = 0.0;
                Duration::from_secs_f64(wait) + self.min_delay
            }
        };

        tokio::time::sleep(delay).await;
    }
}

/// Pseudo-random factor in 0.0..1.0, from the clock's sub-second noise
fn rand_factor() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_within_bucket_is_fast() {
        let limiter = RateLimiter::new(600, 0.0, 0.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_empty_bucket_waits_for_refill() {
        // One request per minute, bucket drained by the first acquire: the
        // second must compute a non-trivial wait. Verified indirectly via
        // the token count to keep the test clock-free.
        let limiter = RateLimiter::new(60, 0.0, 0.0);
        for _ in 0..5 {
            limiter.acquire().await;
        }
        let bucket = limiter.bucket.lock().await;
        assert!(bucket.tokens < 60.0);
    }

    #[test]
    fn test_rand_factor_in_range() {
        for _ in 0..10 {
            let f = rand_factor();
            assert!((0.0..1.0).contains(&f));
        }
    }
}
