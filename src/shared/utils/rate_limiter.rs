use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Sliding-window limiter shared by every client of a process.
///
/// Keeps the issue times of the requests made during the trailing window and
/// makes callers wait while the window is full. One lock guards the window for
/// all callers, so the bound holds across clients built from the same instance.
#[derive(Debug)]
pub struct RateLimiter {
    issued: Mutex<VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub const DEFAULT_REQUESTS_PER_SECOND: usize = 40;

    pub fn new(requests_per_second: usize) -> Self {
        Self::with_window(requests_per_second, Duration::from_secs(1))
    }

    pub fn with_window(max_requests: usize, window: Duration) -> Self {
        Self {
            issued: Mutex::new(VecDeque::with_capacity(max_requests.max(1))),
            max_requests: max_requests.max(1),
            window,
        }
    }

    /// Wait until one more request fits in the trailing window, then record it.
    ///
    /// The lock is held while sleeping so waiters are served in arrival order
    /// and nobody appends behind a sleeping caller's back.
    pub async fn await_slot(&self) {
        let mut issued = self.issued.lock().await;
        loop {
            let now = Instant::now();
            Self::prune(&mut issued, now, self.window);

            if issued.len() < self.max_requests {
                issued.push_back(now);
                return;
            }

            // Window is full: the oldest entry has to age out first
            if let Some(&oldest) = issued.front() {
                sleep_until(oldest + self.window).await;
            }
        }
    }

    /// Requests recorded in the current window (for monitoring and tests)
    pub async fn in_flight_window(&self) -> usize {
        let mut issued = self.issued.lock().await;
        Self::prune(&mut issued, Instant::now(), self.window);
        issued.len()
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    fn prune(issued: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&front) = issued.front() {
            if now.duration_since(front) >= window {
                issued.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REQUESTS_PER_SECOND)
    }
}
