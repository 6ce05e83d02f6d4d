//! Engine health — status snapshot, liveness ping, reconnect supervision.
//!
//! The HTTP layer is an excluded collaborator; it gets a read-only
//! [`StatusSnapshot`] and nothing else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::CorrelationStore;
use crate::clients::Clients;

/// Read-only view of engine state for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub whatsapp_ready: bool,
    pub discord_ready: bool,
    pub active_message_count: usize,
    pub last_ping_at: Option<DateTime<Utc>>,
}

/// Shared health state of the running bridge.
pub struct BridgeHealth {
    clients: Clients,
    store: Arc<CorrelationStore>,
    last_ping: RwLock<Option<DateTime<Utc>>>,
}

impl BridgeHealth {
    pub fn new(clients: Clients, store: Arc<CorrelationStore>) -> Self {
        Self {
            clients,
            store,
            last_ping: RwLock::new(None),
        }
    }

    /// Stamp the liveness marker.
    pub async fn record_ping(&self) {
        *self.last_ping.write().await = Some(Utc::now());
    }

    /// Produce the current status snapshot.
    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            whatsapp_ready: self.clients.whatsapp.is_ready(),
            discord_ready: self.clients.discord.is_ready(),
            active_message_count: self.store.active_count(Utc::now()).await,
            last_ping_at: *self.last_ping.read().await,
        }
    }
}

/// Spawn the periodic liveness ping.
pub fn spawn_liveness_ping(
    health: Arc<BridgeHealth>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            health.record_ping().await;
        }
    });

    (handle, shutdown_flag)
}

/// Spawn the reconnect supervisor.
///
/// Each tick, any client reporting not-ready gets a reconnect attempt, up to
/// `max_attempts` consecutive failures per outage; the counter resets once
/// the client comes back. Failures are logged, never fatal — the engine
/// keeps running on whichever side is still up.
pub fn spawn_reconnect_supervisor(
    clients: Clients,
    interval: Duration,
    max_attempts: u32,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        let mut whatsapp_failures: u32 = 0;
        let mut discord_failures: u32 = 0;
        let mut tick = tokio::time::interval(interval);

        loop {
            tick.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                info!("Reconnect supervisor shutting down");
                return;
            }

            if clients.whatsapp.is_ready() {
                whatsapp_failures = 0;
            } else if whatsapp_failures < max_attempts {
                whatsapp_failures += 1;
                match clients.whatsapp.reconnect().await {
                    Ok(()) => {
                        info!("WhatsApp client re-initialized");
                        whatsapp_failures = 0;
                    }
                    Err(e) => warn!(
                        attempt = whatsapp_failures,
                        max_attempts,
                        error = %e,
                        "WhatsApp reconnect failed"
                    ),
                }
            }

            if clients.discord.is_ready() {
                discord_failures = 0;
            } else if discord_failures < max_attempts {
                discord_failures += 1;
                match clients.discord.reconnect().await {
                    Ok(()) => {
                        info!("Discord client re-initialized");
                        discord_failures = 0;
                    }
                    Err(e) => warn!(
                        attempt = discord_failures,
                        max_attempts,
                        error = %e,
                        "Discord reconnect failed"
                    ),
                }
            }
        }
    });

    (handle, shutdown_flag)
}
