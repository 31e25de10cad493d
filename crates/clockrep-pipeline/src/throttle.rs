//! Upstream rate-limit compliance
//!
//! The member loop calls [`Throttle::pause`] after every successful upstream
//! request. Two strategies are provided:
//!
//! - [`FixedDelay`]: always wait the same amount (300 ms by default)
//! - [`TokenBucket`]: allow bursts up to `capacity`, then one request per
//!   `refill_every`
//!
//! Both sleep through an injected [`Sleeper`], and the bucket reads time from
//! an injected [`TimeSource`], so tests can drive them without real waiting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Delay between member reports used when nothing else is configured
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Abstracts over how to wait for a [`Duration`]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio timer sleep
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

#[async_trait]
impl Sleeper for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Monotonic milliseconds since an arbitrary origin
pub trait TimeSource: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Elapsed time since construction, following tokio's (pausable) clock
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Called once after each completed upstream request in a sequential loop
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn pause(&self);
}

/// Never waits
#[derive(Clone, Copy, Debug, Default)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn pause(&self) {}
}

/// Waits a fixed delay after every request
#[derive(Clone)]
pub struct FixedDelay {
    delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self::with_sleeper(delay, Arc::new(TokioSleep))
    }

    pub fn with_sleeper(delay: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { delay, sleeper }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn pause(&self) {
        if !self.delay.is_zero() {
            self.sleeper.sleep(self.delay).await;
        }
    }
}

/// Token bucket: `capacity` requests in a burst, one token back every `refill_every`
pub struct TokenBucket {
    capacity: u32,
    refill_ms: u64,
    clock: Arc<dyn TimeSource>,
    sleeper: Arc<dyn Sleeper>,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill_ms: u64,
}

impl TokenBucket {
    /// Bucket on tokio's clock and timer
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self::with_time(
            capacity,
            refill_every,
            Arc::new(MonotonicClock::default()),
            Arc::new(TokioSleep),
        )
    }

    pub fn with_time(
        capacity: u32,
        refill_every: Duration,
        clock: Arc<dyn TimeSource>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let capacity = capacity.max(1);
        let refill_ms = u64::try_from(refill_every.as_millis()).unwrap_or(u64::MAX).max(1);
        let now = clock.now_millis();
        Self {
            capacity,
            refill_ms,
            clock,
            sleeper,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill_ms: now,
            }),
        }
    }

    /// Take a token if one is available, otherwise report how long until the next
    async fn try_take(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;
        let now = self.clock.now_millis();

        let elapsed = now.saturating_sub(state.last_refill_ms);
        let earned = elapsed / self.refill_ms;
        if earned > 0 {
            let tokens = u64::from(state.tokens) + earned;
            if tokens >= u64::from(self.capacity) {
                state.tokens = self.capacity;
                state.last_refill_ms = now;
            } else {
                state.tokens = tokens as u32;
                state.last_refill_ms += earned * self.refill_ms;
            }
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            return Ok(());
        }
        // No token means less than one refill period has passed
        let since_refill = now.saturating_sub(state.last_refill_ms);
        Err(Duration::from_millis(self.refill_ms - since_refill))
    }
}

#[async_trait]
impl Throttle for TokenBucket {
    async fn pause(&self) {
        while let Err(wait) = self.try_take().await {
            self.sleeper.sleep(wait).await;
        }
    }
}
