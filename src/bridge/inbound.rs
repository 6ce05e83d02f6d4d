//! Inbound relay — WhatsApp → Discord.
//!
//! Admits trigger-prefixed messages, forwards them to the bridge channel and
//! opens a correlation record for the reply window. The record is inserted
//! before the send and rolled back if delivery fails, so a record only ever
//! outlives this handler when its message actually reached Discord.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bridge::record::BridgeRecord;
use crate::bridge::{reply, BridgeDeps};
use crate::clients::WhatsAppEvent;
use crate::config::{ReplyMode, TriggerMode};
use crate::error::RelayError;

/// Handles inbound WhatsApp events.
pub struct InboundRelay {
    deps: Arc<BridgeDeps>,
}

impl InboundRelay {
    pub fn new(deps: Arc<BridgeDeps>) -> Self {
        Self { deps }
    }

    /// Process one inbound WhatsApp event.
    ///
    /// Returns the new record id when the event was admitted and forwarded,
    /// `None` when it was silently ignored.
    pub async fn handle_event(
        &self,
        event: WhatsAppEvent,
    ) -> Result<Option<String>, RelayError> {
        let config = &self.deps.config;

        let trimmed = event.body.trim();
        if !trimmed.starts_with(config.trigger) {
            return Ok(None);
        }
        if event.is_broadcast {
            debug!("Ignoring trigger message from broadcast pseudo-conversation");
            return Ok(None);
        }
        let Some(forwarded) = forwarded_body(trimmed, config.trigger, config.trigger_mode) else {
            debug!("Ignoring trigger message with empty body");
            return Ok(None);
        };

        // Resolve the true conversation: in groups the sender address and
        // the conversation address differ.
        let conversation = self
            .deps
            .whatsapp
            .resolve_conversation(&event)
            .await
            .map_err(RelayError::Delivery)?;

        let outbound = if config.context_label {
            let sender = event.sender_name.as_deref().unwrap_or(&event.from);
            format!("[{}] {}: {}", conversation.kind.label(), sender, forwarded)
        } else {
            forwarded
        };

        let record = BridgeRecord::new(
            conversation.id.clone(),
            conversation.kind.clone(),
            config.active_window,
        );
        let record_id = record.id.clone();
        self.deps.store.put(record).await;

        if let Err(e) = self.forward(&event, &outbound).await {
            // Roll back: nothing was relayed, so no reply window may open.
            self.deps.store.delete(&record_id).await;
            warn!(error = %e, "Forward to bridge channel failed, record rolled back");
            return Err(e);
        }

        info!(
            record_id = %record_id,
            conversation = %conversation.id,
            "Message bridged, reply window open"
        );
        spawn_expiry(Arc::clone(&self.deps), record_id.clone());
        Ok(Some(record_id))
    }

    /// Send the outbound text (plus media, when present) to the bridge channel.
    async fn forward(&self, event: &WhatsAppEvent, outbound: &str) -> Result<(), RelayError> {
        let config = &self.deps.config;

        if !event.has_media {
            return self
                .deps
                .discord
                .send_text(&config.bridge_channel_id, outbound)
                .await
                .map_err(RelayError::Delivery);
        }

        let media = self
            .deps
            .whatsapp
            .download_media(event)
            .await
            .map_err(RelayError::Delivery)?;
        let display_name = media.filename.clone().unwrap_or_else(|| "attachment".into());

        let path = self.deps.scratch.write(&display_name, &media.data).await?;

        let result = self
            .deps
            .discord
            .send_file(
                &config.bridge_channel_id,
                Some(outbound),
                &path,
                &display_name,
            )
            .await
            .map_err(RelayError::Delivery);

        // The file is released on a short linger either way; a failed delete
        // is logged inside the scratch store, never fatal.
        self.deps
            .scratch
            .schedule_delete(path, config.scratch_linger);

        result
    }
}

/// Fire-and-forget window expiry for one record.
///
/// Immediate mode just drops the record once the window lapses; batch mode
/// flushes the collected replies back to the conversation. The task is
/// abandoned on shutdown — in-memory state is not durable by design.
fn spawn_expiry(deps: Arc<BridgeDeps>, record_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(deps.config.active_window).await;
        match deps.config.reply_mode {
            ReplyMode::Immediate => {
                if deps.store.delete(&record_id).await.is_some() {
                    debug!(record_id = %record_id, "Reply window closed, record dropped");
                }
            }
            ReplyMode::Batch => {
                reply::flush_window(&deps, &record_id).await;
            }
        }
    });
}

/// Apply the trigger handling policy to an already-trimmed body.
///
/// Returns `None` when the remaining body is empty under the policy.
fn forwarded_body(trimmed: &str, trigger: char, mode: TriggerMode) -> Option<String> {
    let body = match mode {
        TriggerMode::Keep => trimmed,
        TriggerMode::Strip => trimmed
            .strip_prefix(trigger)
            .map(str::trim)
            .unwrap_or_default(),
    };
    if body.is_empty() {
        None
    } else {
        Some(body.to_string())
    }
}
