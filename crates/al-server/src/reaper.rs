//! Background task that stops sessions nobody is reading anymore.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::SessionRegistry;

/// Start a background task that periodically stops idle sessions.
///
/// Every `interval` the registry is asked to reap sessions with no read
/// activity for `idle_timeout`. The task ends when `cancel` fires.
pub fn start_idle_reaper(
    registry: SessionRegistry,
    interval: Duration,
    idle_timeout: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = registry.reap_idle(idle_timeout);
                    if !reaped.is_empty() {
                        tracing::debug!(count = reaped.len(), "Reaped idle sessions");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        tracing::debug!("Idle reaper stopped");
    })
}
