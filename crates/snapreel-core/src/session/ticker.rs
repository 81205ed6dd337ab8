use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::debug;

/// Period between elapsed-time callbacks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Receives the elapsed recording time on every tick.
pub type ElapsedCallback = Arc<dyn Fn(Duration) + Send + Sync>;

/// Periodic elapsed-time notifier. Aborted when cancelled or dropped.
pub struct ElapsedTicker {
    task: JoinHandle<()>,
}

impl ElapsedTicker {
    /// Start ticking on the current tokio runtime, measuring from `started_at`.
    pub fn start(started_at: Instant, callback: ElapsedCallback) -> Self {
        let task = tokio::spawn(async move {
            let mut ticks = interval(TICK_INTERVAL);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately.
            ticks.tick().await;

            loop {
                ticks.tick().await;
                callback(started_at.elapsed());
            }
        });

        Self { task }
    }

    /// Stop delivering callbacks.
    pub fn cancel(self) {
        debug!("Elapsed ticker cancelled");
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
