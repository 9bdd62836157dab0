//! Display tick for live elapsed-time readouts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shopfloor_core::Clock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Publishes the current time at a fixed period so views can re-render
/// running clocks. It never writes to the cache or the remote store.
pub struct DisplayTicker {
    receiver: watch::Receiver<DateTime<Utc>>,
    handle: JoinHandle<()>,
}

impl DisplayTicker {
    /// Period used by the workshop views.
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

    /// Spawns the ticker on the current tokio runtime.
    pub fn spawn(clock: Arc<dyn Clock>, period: Duration) -> Self {
        let (sender, receiver) = watch::channel(clock.now());
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if sender.send(clock.now()).is_err() {
                    break;
                }
            }
        });
        Self { receiver, handle }
    }

    /// A receiver that is notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<DateTime<Utc>> {
        self.receiver.clone()
    }

    /// Time of the latest tick.
    pub fn now(&self) -> DateTime<Utc> {
        *self.receiver.borrow()
    }
}

impl Drop for DisplayTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
