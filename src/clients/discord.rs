//! Discord client — raw REST API sender.
//!
//! Native implementation over `POST /channels/{id}/messages`; no gateway
//! connection. Gateway events are the embedder's job and arrive through
//! [`EventStream<DiscordEvent>`](super::EventStream).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::clients::DiscordClient;
use crate::error::ClientError;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Maximum message length for a Discord message.
const DISCORD_MAX_MESSAGE_LENGTH: usize = 2000;

/// Discord REST client authenticated as a bot.
pub struct DiscordRestClient {
    bot_token: String,
    client: reqwest::Client,
    ready: AtomicBool,
}

impl DiscordRestClient {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
            ready: AtomicBool::new(false),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{DISCORD_API_BASE}{path}")
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    /// Verify the token against `/users/@me` and update readiness.
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let resp = self
            .client
            .get(self.api_url("/users/@me"))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        if resp.status().is_success() {
            self.ready.store(true, Ordering::Relaxed);
            Ok(())
        } else {
            self.ready.store(false, Ordering::Relaxed);
            Err(ClientError::NotReady {
                platform: "discord".into(),
            })
        }
    }

    async fn post_message_json(
        &self,
        channel_id: &str,
        body: serde_json::Value,
    ) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.api_url(&format!("/channels/{channel_id}/messages")))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::SendFailed {
                platform: "discord".into(),
                reason: e.to_string(),
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::ChannelNotFound {
                id: channel_id.to_string(),
            });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::SendFailed {
                platform: "discord".into(),
                reason: format!("createMessage returned {status}: {err}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DiscordClient for DiscordRestClient {
    async fn send_text(&self, channel_id: &str, content: &str) -> Result<(), ClientError> {
        for chunk in split_message(content, DISCORD_MAX_MESSAGE_LENGTH) {
            self.post_message_json(channel_id, serde_json::json!({ "content": chunk }))
                .await?;
        }
        Ok(())
    }

    async fn send_file(
        &self,
        channel_id: &str,
        content: Option<&str>,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ClientError> {
        let file_bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::SendFailed {
                platform: "discord".into(),
                reason: format!("read {}: {e}", path.display()),
            }
        })?;

        let payload = serde_json::json!({
            "content": content.unwrap_or_default(),
            "attachments": [{ "id": 0, "filename": file_name }],
        });

        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part(
                "files[0]",
                Part::bytes(file_bytes).file_name(file_name.to_string()),
            );

        let resp = self
            .client
            .post(self.api_url(&format!("/channels/{channel_id}/messages")))
            .header("Authorization", self.auth_header())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::SendFailed {
                platform: "discord".into(),
                reason: e.to_string(),
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::ChannelNotFound {
                id: channel_id.to_string(),
            });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ClientError::SendFailed {
                platform: "discord".into(),
                reason: format!("createMessage (multipart) returned {status}: {err}"),
            });
        }

        tracing::info!(channel_id, file_name, "Discord file sent");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    async fn reconnect(&self) -> Result<(), ClientError> {
        self.health_check().await
    }
}

/// Split a message into chunks that fit Discord's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts. Cuts are
/// floored to char boundaries, so multi-byte text never panics the slice.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let cut = floor_char_boundary(remaining, max_len);
        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// Largest char boundary at or below `index`. Never returns 0 for non-empty
/// text unless `index` is 0, so the splitter always makes progress.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    if index == 0 && !text.is_empty() {
        text.chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(text.len())
    } else {
        index
    }
}
