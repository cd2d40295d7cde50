//! Background timeout sweep over the pending table.

use crate::domain::PendingTable;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Fail expired invocations every `interval`. Runs until the task is aborted.
pub async fn timeout_sweep_task(table: Arc<PendingTable>, interval: Duration) {
    // tokio rejects a zero period
    let mut sweep_interval = tokio::time::interval(interval.max(Duration::from_millis(1)));
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let failed = table.fail_timeouts(Instant::now());
        if failed > 0 {
            debug!(failed = failed, "Swept timed-out invocations");
        }
    }
}

/// Spawn [`timeout_sweep_task`] on the current tokio runtime.
pub fn spawn_timeout_sweeper(table: Arc<PendingTable>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(timeout_sweep_task(table, interval))
}
