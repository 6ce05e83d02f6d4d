//! Retention sweeper — hard cleanup deadline for correlation records.
//!
//! Per-record expiry is a fire-and-forget task and can be lost (scheduling
//! failure, restart mid-flight). The sweeper is the safety net: on a fixed
//! period it reaps every record older than the coarse retention ceiling,
//! independent of any record's reply window.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bridge::CorrelationStore;
use crate::config::BridgeConfig;

/// Spawn the periodic retention sweep.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop sweeping.
pub fn spawn_sweeper(
    store: Arc<CorrelationStore>,
    config: &BridgeConfig,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    let interval = config.sweep_interval;
    let ceiling = config.retention_ceiling;

    let handle = tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            ceiling_secs = ceiling.as_secs(),
            "Retention sweeper started"
        );

        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Retention sweeper shutting down");
                return;
            }

            let reaped = store.sweep_expired(ceiling, Utc::now()).await;
            if !reaped.is_empty() {
                info!(count = reaped.len(), "Reaped stale bridge records");
            }
        }
    });

    (handle, shutdown_flag)
}
