//! Background expiry sweeper.
//!
//! `Queue::get` already removes expired records before claiming, so the
//! sweeper is only a backstop for queues that are written to but rarely
//! polled. It runs the blocking sweep on tokio's blocking pool every `period`
//! until the returned handle is aborted or the runtime shuts down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::error;

use crate::config::QueueSettings;
use crate::queue::Queue;
use crate::queue::engine::secs_to_duration;
use crate::utils::error::Result;

/// Smallest accepted sweep period.
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Spawn a task sweeping `queue` every `period`. Must be called from within a
/// tokio runtime.
pub fn spawn<T: 'static>(queue: Arc<Queue<T>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(MIN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let target = Arc::clone(&queue);
            match tokio::task::spawn_blocking(move || target.sweep()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(queue = queue.name(), error = %e, "expiry sweep failed"),
                Err(e) => error!(queue = queue.name(), error = %e, "expiry sweep task failed"),
            }
        }
    })
}

/// Spawn a sweeper running every `queue.sweep_interval_secs`.
pub fn spawn_from_settings<T: 'static>(
    queue: Arc<Queue<T>>,
    settings: &QueueSettings,
) -> Result<JoinHandle<()>> {
    let period = secs_to_duration("sweep_interval_secs", settings.sweep_interval_secs)?;
    Ok(spawn(queue, period))
}
