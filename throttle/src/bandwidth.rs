use tokio::time::{Duration, Instant};

pub const KB_TO_BYTES: u64 = 1024;

/// Chunk size handed out by an unlimited limiter.
pub const UNLIMITED_CHUNK_SIZE: u64 = 128 * 1024;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Per-transfer bandwidth limiter working in one-second windows.
#[derive(Debug)]
pub struct RateLimiter {
    // None means no throttling
    capacity: Option<u64>,
    remaining: u64,
    window_start: Instant,
}

impl RateLimiter {
    /// Creates a limiter allowing `bandwidth_kb` KB per second, 0 means no throttle.
    #[must_use]
    pub fn new(bandwidth_kb: u64) -> Self {
        if bandwidth_kb == 0 {
            return Self::unlimited();
        }
        let capacity = bandwidth_kb.saturating_mul(KB_TO_BYTES);
        Self {
            capacity: Some(capacity),
            remaining: capacity,
            window_start: Instant::now(),
        }
    }

    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            capacity: None,
            remaining: UNLIMITED_CHUNK_SIZE,
            window_start: Instant::now(),
        }
    }

    /// Bytes allowed per window, `None` for an unlimited limiter.
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Maximum number of bytes the caller may read in its next I/O operation.
    ///
    /// Never returns 0 so a read sized by it can only return 0 at end of file.
    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.remaining
    }

    /// Accounts for `bytes` that were just transferred.
    ///
    /// Once the window budget is used up the task sleeps until one second has passed since the
    /// window started and a new window begins. If the second already elapsed (slow I/O), the new
    /// window starts immediately without sleeping.
    pub async fn consume(&mut self, bytes: u64) {
        let Some(capacity) = self.capacity else {
            return;
        };
        if bytes < self.remaining {
            self.remaining -= bytes;
            return;
        }
        let elapsed = self.window_start.elapsed();
        if elapsed < ONE_SECOND {
            let pause = ONE_SECOND - elapsed;
            tracing::trace!("window budget of {} bytes used up, sleeping {:?}", capacity, pause);
            tokio::time::sleep(pause).await;
        }
        self.reset(capacity);
    }

    fn reset(&mut self, capacity: u64) {
        self.remaining = capacity;
        self.window_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_kilobytes() {
        let limiter = RateLimiter::new(10);
        assert_eq!(limiter.capacity(), Some(10 * 1024));
        assert_eq!(limiter.chunk_size(), 10 * 1024);
    }

    #[test]
    fn zero_bandwidth_is_unlimited() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.capacity(), None);
        assert_eq!(limiter.chunk_size(), UNLIMITED_CHUNK_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn partial_chunk_does_not_sleep() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(1);
        limiter.consume(100).await;
        assert_eq!(limiter.chunk_size(), 1024 - 100);
        limiter.consume(900).await;
        assert_eq!(limiter.chunk_size(), 24);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_sleeps_rest_of_window() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(1);
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.consume(1024).await;
        assert_eq!(start.elapsed(), ONE_SECOND);
        assert_eq!(limiter.chunk_size(), 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_io_starts_new_window_without_sleeping() {
        let mut limiter = RateLimiter::new(1);
        limiter.consume(1000).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        let before = Instant::now();
        limiter.consume(24).await;
        assert_eq!(before.elapsed(), Duration::ZERO);
        // the budget is refilled even though no sleep happened
        assert_eq!(limiter.chunk_size(), 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn throughput_is_bounded() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(4);
        let total: u64 = 10 * 4 * 1024;
        let mut copied = 0;
        while copied < total {
            let chunk = std::cmp::min(limiter.chunk_size(), total - copied);
            copied += chunk;
            limiter.consume(chunk).await;
        }
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn small_reads_cannot_bypass_the_limit() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(1);
        // reads much smaller than the budget still add up to full windows
        let mut copied = 0;
        while copied < 3 * 1024 {
            let chunk = std::cmp::min(100, limiter.chunk_size());
            copied += chunk;
            limiter.consume(chunk).await;
        }
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_never_sleeps() {
        let start = Instant::now();
        let mut limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            let chunk = limiter.chunk_size();
            limiter.consume(chunk).await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
