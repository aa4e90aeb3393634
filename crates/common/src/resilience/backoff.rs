//! Backoff strategies for calculating retry delays
//!
//! Delays are indexed by *retry number*: retry 1 is the first re-attempt after
//! the initial call failed. Every strategy carries a ceiling so a long run of
//! failures can never produce an unbounded wait.

use std::time::Duration;

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed { delay: Duration, max_delay: Duration },
    /// `initial_delay * 2^(retry - 1)`, capped at `max_delay`
    Exponential { initial_delay: Duration, max_delay: Duration },
}

impl BackoffStrategy {
    /// Build a strategy from the usual configuration triple.
    pub fn from_parts(base_delay: Duration, exponential: bool, max_delay: Duration) -> Self {
        if exponential {
            Self::Exponential { initial_delay: base_delay, max_delay }
        } else {
            Self::Fixed { delay: base_delay, max_delay }
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    ///
    /// `retry == 0` is treated like the first retry.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed { delay, max_delay } => delay.min(max_delay),
            Self::Exponential { initial_delay, max_delay } => {
                let shift = retry.saturating_sub(1).min(31);
                initial_delay.saturating_mul(1u32 << shift).min(max_delay)
            }
        }
    }

    /// The ceiling applied to every delay.
    pub fn max_delay(&self) -> Duration {
        match *self {
            Self::Fixed { max_delay, .. } | Self::Exponential { max_delay, .. } => max_delay,
        }
    }
}
