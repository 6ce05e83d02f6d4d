//! The bridge correlation engine.

pub mod inbound;
pub mod record;
pub mod reply;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testutil;

pub use inbound::InboundRelay;
pub use record::{AttachmentRef, BridgeRecord, ReplyEntry};
pub use reply::ReplyRelay;
pub use store::CorrelationStore;

use std::sync::Arc;

use crate::attachments::{AttachmentFetcher, ScratchStore};
use crate::clients::{DiscordClient, WhatsAppClient};
use crate::config::BridgeConfig;

/// Shared dependencies of both relay legs and the expiry path.
#[derive(Clone)]
pub struct BridgeDeps {
    pub config: BridgeConfig,
    pub store: Arc<CorrelationStore>,
    pub whatsapp: Arc<dyn WhatsAppClient>,
    pub discord: Arc<dyn DiscordClient>,
    pub fetcher: Arc<dyn AttachmentFetcher>,
    pub scratch: ScratchStore,
}
