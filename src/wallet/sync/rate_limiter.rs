//! Token bucket pacing for outbound explorer calls.
//!
//! The explorer enforces a hard request rate, so every call the sync engine
//! makes first takes a token from a [`RateLimiter`]. A bucket of capacity one
//! behaves as a fixed pacing interval: the first call goes out at once and each
//! later call waits until one interval has passed since the previous token.
//!
//! Time comes from `tokio::time`, so tests can drive the limiter with a paused
//! clock instead of real delays.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum burst size.
    capacity: u32,
    /// Time to earn one token.
    refill_interval: Duration,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a full bucket holding `capacity` tokens, earning one every `refill_interval`.
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// One call per `interval`, no bursts.
    pub fn pacing(interval: Duration) -> Self {
        Self::new(1, interval)
    }

    /// Take a token if one is available, or report how long until the next one.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        self.refill(&mut state, now);

        if state.tokens > 0 {
            state.tokens -= 1;
            if state.tokens + 1 == self.capacity {
                // The bucket was full, so the refill clock starts now.
                state.last_refill = now;
            }
            return Ok(());
        }

        let since_refill = now.saturating_duration_since(state.last_refill);
        Err(self.refill_interval.saturating_sub(since_refill))
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limited, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Empty the bucket and restart the refill clock, so the next token is one
    /// full interval away from now.
    pub fn restart(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.tokens = 0;
        state.last_refill = Instant::now();
    }

    /// Tokens currently available.
    pub fn available(&self) -> u32 {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        if state.tokens >= self.capacity {
            return;
        }
        if self.refill_interval.is_zero() {
            state.tokens = self.capacity;
            state.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(state.last_refill);
        let earned = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }

        let missing = self.capacity - state.tokens;
        if earned >= missing as u128 {
            state.tokens = self.capacity;
            state.last_refill = now;
        } else {
            let earned = earned as u32;
            state.tokens += earned;
            state.last_refill += self.refill_interval * earned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::pacing(Duration::from_secs(15));
        let start = Instant::now();

        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_spaces_calls_by_interval() {
        let limiter = RateLimiter::pacing(Duration::from_secs(15));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(15) && elapsed < Duration::from_secs(16));

        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_without_waiting() {
        let limiter = RateLimiter::pacing(Duration::from_secs(15));
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(40)).await;
        let before = Instant::now();
        limiter.acquire().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_secs(10));

        for _ in 0..3 {
            assert!(limiter.try_acquire().is_ok());
        }
        assert_eq!(limiter.try_acquire(), Err(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(25)).await;
        assert_eq!(limiter.available(), 2);
        assert_eq!(limiter.try_acquire(), Ok(()));
        assert_eq!(limiter.try_acquire(), Ok(()));
        assert_eq!(limiter.try_acquire(), Err(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::pacing(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_full_interval() {
        let limiter = RateLimiter::pacing(Duration::from_secs(30));
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(45)).await;
        limiter.restart();
        assert_eq!(limiter.available(), 0);

        let before = Instant::now();
        limiter.acquire().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
    }
}
