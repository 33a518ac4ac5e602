//! Periodic total-call trigger.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Fires every `period`, starting one period after creation.
///
/// A zero period disables the scheduler: `tick` then never completes.
#[derive(Debug)]
pub struct TotalCallScheduler {
    interval: Option<Interval>,
}

impl TotalCallScheduler {
    /// Create a scheduler with the given period.
    pub fn new(period: Duration) -> Self {
        let interval = (!period.is_zero()).then(|| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { interval }
    }

    /// Wait for the next trigger. Cancel safe.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
