//! Inter-page pacing
//!
//! A bounded, jittered delay between page fetches that returns early when the
//! session is cancelled.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::infrastructure::PacingConfig;

#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        let min = Duration::from_millis(config.min_delay_ms);
        let max = Duration::from_millis(config.max_delay_ms.max(config.min_delay_ms));
        Self { min, max }
    }

    /// No delay at all; used by tests and offline runs
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Uniformly jittered delay in `[min, max]`
    pub fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(fastrand::u64(min..=max))
    }

    /// Sleep for the next delay; returns `false` when cancelled first
    pub async fn pause(&self, cancellation_token: &CancellationToken) -> bool {
        let delay = self.next_delay();
        if delay.is_zero() {
            return !cancellation_token.is_cancelled();
        }

        debug!("Pacing for {:?}", delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancellation_token.cancelled() => false,
        }
    }
}
