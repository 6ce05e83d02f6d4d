//! Reply relay — Discord → WhatsApp.
//!
//! Every message in the bridge channel is a candidate reply. Matching is
//! first-active-wins over the correlation store; what happens next depends on
//! the configured [`ReplyMode`](crate::config::ReplyMode):
//!
//! - immediate: relay to the matched conversation right away, leave the
//!   record matchable until its window lapses (multiple replies possible);
//! - batch: append to the record's collected replies and let the window
//!   expiry flush everything in one pass.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::attachments::is_plain_text;
use crate::bridge::record::{AttachmentRef, ReplyEntry};
use crate::bridge::BridgeDeps;
use crate::clients::{DiscordAttachment, DiscordEvent};
use crate::config::ReplyMode;
use crate::error::RelayError;

/// Notice sent when a batch window closes without any collected reply.
const NO_RESPONSE_NOTICE: &str = "No response received.";

/// Handles inbound Discord events from the bridge channel.
pub struct ReplyRelay {
    deps: Arc<BridgeDeps>,
}

impl ReplyRelay {
    pub fn new(deps: Arc<BridgeDeps>) -> Self {
        Self { deps }
    }

    /// Process one inbound Discord event.
    pub async fn handle_event(&self, event: DiscordEvent) -> Result<(), RelayError> {
        if event.channel_id != self.deps.config.bridge_channel_id {
            return Ok(());
        }
        if event.content.trim().is_empty() && event.attachments.is_empty() {
            return Ok(());
        }

        match self.deps.config.reply_mode {
            ReplyMode::Immediate => self.relay_immediate(event).await,
            ReplyMode::Batch => self.collect(event).await,
        }
    }

    /// Immediate mode: forward to the first active record's conversation.
    async fn relay_immediate(&self, event: DiscordEvent) -> Result<(), RelayError> {
        let Some(record) = self.deps.store.first_active(Utc::now()).await else {
            debug!("Reply with no active bridge record, ignored");
            return Ok(());
        };

        let text = event.content.trim();
        if !text.is_empty() {
            let outbound = decorate(self.deps.config.context_label, &event.author, text);
            self.deps
                .whatsapp
                .send_text(&record.conversation_id, &outbound)
                .await
                .map_err(RelayError::Delivery)?;
        }

        for attachment in &event.attachments {
            if let Err(e) = self
                .relay_attachment_now(&record.conversation_id, attachment)
                .await
            {
                warn!(name = %attachment.name, error = %e, "Attachment relay failed");
                let _ = self
                    .deps
                    .whatsapp
                    .send_text(
                        &record.conversation_id,
                        &attachment_failure_notice(&attachment.name),
                    )
                    .await;
            }
        }

        info!(record_id = %record.id, "Reply relayed");
        Ok(())
    }

    /// Download and forward one attachment right away. Plain-text files go
    /// inline as message text; everything else goes through a scratch file
    /// that is removed as soon as the send returns.
    async fn relay_attachment_now(
        &self,
        conversation_id: &str,
        attachment: &DiscordAttachment,
    ) -> Result<(), RelayError> {
        let bytes = self.deps.fetcher.fetch_bytes(&attachment.url).await?;

        if is_plain_text(&attachment.name) {
            let text = String::from_utf8_lossy(&bytes);
            return self
                .deps
                .whatsapp
                .send_text(conversation_id, text.trim_end())
                .await
                .map_err(RelayError::Delivery);
        }

        let path = self.deps.scratch.write(&attachment.name, &bytes).await?;
        let result = self
            .deps
            .whatsapp
            .send_attachment(conversation_id, &path, None)
            .await
            .map_err(RelayError::Delivery);
        self.deps.scratch.delete(&path).await;
        result
    }

    /// Batch mode: stage attachments on disk and append a reply entry to the
    /// first active record. Nothing is sent until the window flush.
    async fn collect(&self, event: DiscordEvent) -> Result<(), RelayError> {
        let Some(candidate) = self.deps.store.first_active(Utc::now()).await else {
            debug!("Reply with no active bridge record, ignored");
            return Ok(());
        };

        let mut attachments = Vec::new();
        for attachment in &event.attachments {
            match self.stage_attachment(attachment).await {
                Ok(aref) => attachments.push(aref),
                Err(e) => {
                    warn!(name = %attachment.name, error = %e, "Attachment staging failed");
                    let _ = self
                        .deps
                        .whatsapp
                        .send_text(
                            &candidate.conversation_id,
                            &attachment_failure_notice(&attachment.name),
                        )
                        .await;
                }
            }
        }

        let staged: Vec<PathBuf> = attachments.iter().map(|a| a.local_path.clone()).collect();
        let entry = ReplyEntry {
            text: event.content.trim().to_string(),
            author: event.author.clone(),
            attachments,
            received_at: Utc::now(),
        };

        match self
            .deps
            .store
            .append_reply_first_active(entry, Utc::now())
            .await
        {
            Some(record_id) => {
                debug!(record_id = %record_id, "Reply collected");
            }
            None => {
                // The candidate aged out or was deleted between the lookup
                // and the append; the staged files have no owner now.
                for path in staged {
                    self.deps.scratch.delete(&path).await;
                }
                debug!("Matched record vanished before append, reply dropped");
            }
        }
        Ok(())
    }

    async fn stage_attachment(
        &self,
        attachment: &DiscordAttachment,
    ) -> Result<AttachmentRef, RelayError> {
        let bytes = self.deps.fetcher.fetch_bytes(&attachment.url).await?;
        let path = self.deps.scratch.write(&attachment.name, &bytes).await?;
        Ok(AttachmentRef {
            display_name: attachment.name.clone(),
            local_path: path,
            mime_type: attachment.content_type.clone(),
        })
    }
}

/// Window expiry for a batch-mode record: deliver everything collected, or a
/// single no-response notice, then drop the record.
///
/// The record is removed from the store up front — it is already inert, and
/// owning it keeps the flush free of re-lookups. A record the sweeper reaped
/// first flushes as a no-op.
pub async fn flush_window(deps: &BridgeDeps, record_id: &str) {
    let Some(record) = deps.store.delete(record_id).await else {
        return;
    };
    let conversation = &record.conversation_id;

    if record.replies.is_empty() {
        info!(record_id, "Window closed with no replies");
        if let Err(e) = deps.whatsapp.send_text(conversation, NO_RESPONSE_NOTICE).await {
            warn!(error = %e, "Failed to send no-response notice");
        }
        return;
    }

    info!(
        record_id,
        replies = record.replies.len(),
        "Window closed, flushing collected replies"
    );

    for entry in &record.replies {
        let text = entry.text.trim();
        if !text.is_empty() {
            let outbound = decorate(deps.config.context_label, &entry.author, text);
            if let Err(e) = deps.whatsapp.send_text(conversation, &outbound).await {
                warn!(error = %e, "Failed to relay collected reply text");
            }
            tokio::time::sleep(deps.config.send_spacing).await;
        }

        for aref in &entry.attachments {
            if let Err(e) = flush_attachment(deps, conversation, aref).await {
                warn!(name = %aref.display_name, error = %e, "Attachment flush failed");
                let _ = deps
                    .whatsapp
                    .send_text(conversation, &attachment_failure_notice(&aref.display_name))
                    .await;
            }
            deps.scratch.delete(&aref.local_path).await;
            tokio::time::sleep(deps.config.send_spacing).await;
        }
    }
}

async fn flush_attachment(
    deps: &BridgeDeps,
    conversation: &str,
    aref: &AttachmentRef,
) -> Result<(), RelayError> {
    if is_plain_text(&aref.display_name) {
        let text = deps.scratch.read_text(&aref.local_path).await?;
        deps.whatsapp
            .send_text(conversation, text.trim_end())
            .await
            .map_err(RelayError::Delivery)
    } else {
        deps.whatsapp
            .send_attachment(conversation, &aref.local_path, None)
            .await
            .map_err(RelayError::Delivery)
    }
}

fn decorate(with_author: bool, author: &str, text: &str) -> String {
    if with_author {
        format!("{author}: {text}")
    } else {
        text.to_string()
    }
}

fn attachment_failure_notice(name: &str) -> String {
    format!("⚠️ Could not relay attachment: {name}")
}
