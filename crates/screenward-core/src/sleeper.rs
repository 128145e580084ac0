//! Delay utility shared by the tracker and the scroller.

use std::time::Duration;

use crate::config::Timing;

/// Awaitable pauses with configured default lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sleeper {
    timing: Timing,
}

impl Sleeper {
    /// Creates a sleeper using the given intervals.
    pub fn new(timing: Timing) -> Self {
        Self { timing }
    }

    /// Pauses for the default interval.
    pub async fn pause(&self) {
        tokio::time::sleep(self.pause_duration()).await;
    }

    /// Pauses for the short interval.
    pub async fn short_pause(&self) {
        tokio::time::sleep(self.short_pause_duration()).await;
    }

    /// Pauses for `ms` milliseconds.
    pub async fn pause_for(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_millis(self.timing.pause_ms)
    }

    pub fn short_pause_duration(&self) -> Duration {
        Duration::from_millis(self.timing.mini_pause_ms)
    }
}
