use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Indirection over `tokio::time::sleep` so the two timers the core relies
/// on — the coalesce debounce and the branch-switch settle delay — can be
/// driven instantly and deterministically in tests (§5's "Timers" note).
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    async fn sleep(&self, duration: Duration);
}

/// Production clock: a thin wrapper over `tokio::time::sleep`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Test clock: returns immediately and records every requested duration so
/// assertions can check exactly what delay was asked for, without the test
/// taking wall-clock time.
#[derive(Default)]
pub struct ManualClock {
    requested: Mutex<Vec<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn requested_sleeps(&self) -> Vec<Duration> {
        self.requested.lock().expect("ManualClock mutex poisoned").clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().expect("ManualClock mutex poisoned").push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_clock_records_durations_without_waiting() {
        let clock = ManualClock::new();
        clock.sleep(Duration::from_millis(10)).await;
        clock.sleep(Duration::from_secs(1)).await;
        assert_eq!(
            clock.requested_sleeps(),
            vec![Duration::from_millis(10), Duration::from_secs(1)]
        );
    }
}
