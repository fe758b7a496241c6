//! Per-worker pacing.
//!
//! Each worker owns its own [`RateLimiter`]; there is no global rate. The
//! limiter is a fixed-interval ticker whose first tick fires one full period
//! after construction. Late ticks are delayed rather than bunched up, so a
//! worker that fell behind never bursts to catch up.
//!
//! ```text
//!   t=0      t=p      t=2p     t=3p (late)  t=3p+δ+p
//!    │ wait   │ act    │ act     │ act        │ act
//!    └────────┴────────┴─────────┴────────────┘
//! ```

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Result of [`RateLimiter::wait`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    /// The interval elapsed; the worker may act
    Ready,
    /// The run was stopped while (or before) waiting
    Cancelled,
}

/// Fixed-interval ticker that can be cancelled mid-wait
#[derive(Debug)]
pub struct RateLimiter {
    interval: Interval,
    shutdown: watch::Receiver<bool>,
}

impl RateLimiter {
    /// Create a limiter ticking every `period`.
    ///
    /// `shutdown` flips to `true` when the owning run is stopped. A dropped
    /// sender is treated the same way.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime or if `period` is zero.
    /// Configurations are validated before any limiter is built.
    #[must_use]
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, shutdown }
    }

    /// Whether the owning run has been stopped
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for the next tick.
    ///
    /// Returns [`Pace::Cancelled`] as soon as the run is stopped, without
    /// waiting out the rest of the interval.
    pub async fn wait(&mut self) -> Pace {
        if self.is_cancelled() {
            return Pace::Cancelled;
        }

        tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stopped| *stopped) => Pace::Cancelled,
            _ = self.interval.tick() => Pace::Ready,
        }
    }
}
