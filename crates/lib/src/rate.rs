//! Rate limiter: sliding one-minute window plus a fixed inter-message delay.
//!
//! The window is guarded by a single mutex that stays held across the waits,
//! so dispatch admissions are serialized: only one caller at a time reaches
//! the append step, and the window never holds an entry older than 60 seconds
//! after a mutation.

use crate::config::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Serializes dispatches against a rolling per-minute budget and a fixed delay.
pub struct RateLimiter {
    window: Mutex<VecDeque<Instant>>,
    message_delay: Duration,
    flood_wait_multiplier: f64,
    max_per_minute: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Mutex::new(VecDeque::new()),
            message_delay: Duration::from_secs_f64(config.message_delay.max(0.0)),
            flood_wait_multiplier: config.flood_wait_multiplier.max(0.0),
            max_per_minute: config.max_messages_per_minute.max(1),
        }
    }

    /// Suspend until a dispatch is permitted, then record it in the window.
    ///
    /// Waits for the oldest entry to leave the window when the per-minute
    /// budget is spent, then applies the fixed delay unconditionally. Effective
    /// throughput is the lower of the two constraints.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        prune(&mut window);

        if window.len() >= self.max_per_minute {
            if let Some(oldest) = window.front().copied() {
                let wait = WINDOW.saturating_sub(oldest.elapsed());
                if !wait.is_zero() {
                    log::info!("rate limit reached, waiting {:.1}s", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                }
            }
            prune(&mut window);
        }

        if !self.message_delay.is_zero() {
            tokio::time::sleep(self.message_delay).await;
            prune(&mut window);
        }

        window.push_back(Instant::now());
    }

    /// React to a provider backoff signal: suspend for the suggested wait
    /// scaled by the configured multiplier. Does not touch the window.
    pub async fn penalize(&self, signaled_wait_seconds: u64) {
        let wait =
            Duration::from_secs_f64(signaled_wait_seconds as f64 * self.flood_wait_multiplier);
        log::warn!(
            "flood wait: server requested {}s, waiting {:.0}s",
            signaled_wait_seconds,
            wait.as_secs_f64()
        );
        tokio::time::sleep(wait).await;
    }

    #[cfg(test)]
    async fn window_len(&self) -> usize {
        self.window.lock().await.len()
    }
}

/// Drop entries older than the window relative to now.
fn prune(window: &mut VecDeque<Instant>) {
    while let Some(oldest) = window.front() {
        if oldest.elapsed() >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}
