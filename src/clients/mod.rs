//! Platform client seams.
//!
//! The engine never talks to WhatsApp Web or the Discord gateway directly.
//! It consumes inbound events as streams and sends through the two traits
//! below; the embedder binds them to its real SDK connections. A concrete
//! Discord REST sender is provided in [`discord`] since that side is a plain
//! HTTP API.

pub mod discord;

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use crate::error::ClientError;

/// Pinned, sendable stream of inbound platform events.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// An inbound WhatsApp message event.
#[derive(Debug, Clone)]
pub struct WhatsAppEvent {
    /// Raw message body.
    pub body: String,
    /// Raw sender address. In groups this is the participant, not the chat.
    pub from: String,
    /// Display name of the sender, when the contact resolves to one.
    pub sender_name: Option<String>,
    /// True for the platform's broadcast/status pseudo-conversation.
    pub is_broadcast: bool,
    /// True when the event carries a media payload.
    pub has_media: bool,
}

/// Kind of WhatsApp conversation an event originated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationKind {
    Direct,
    Group { name: String },
}

impl ConversationKind {
    /// Label used for the forwarded-context prefix.
    pub fn label(&self) -> &str {
        match self {
            ConversationKind::Direct => "Privat",
            ConversationKind::Group { name } => name,
        }
    }
}

/// A resolved WhatsApp conversation.
///
/// `id` is the conversation's own address — for groups it differs from the
/// sender address on the event, which is why resolution goes through the
/// client instead of reusing `event.from`.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
}

/// Bytes plus naming for a downloaded WhatsApp media payload.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
}

/// An inbound Discord message event.
#[derive(Debug, Clone)]
pub struct DiscordEvent {
    pub content: String,
    pub author: String,
    pub channel_id: String,
    pub attachments: Vec<DiscordAttachment>,
}

/// One attachment on a Discord message.
#[derive(Debug, Clone)]
pub struct DiscordAttachment {
    pub url: String,
    pub name: String,
    pub content_type: Option<String>,
}

/// Sending/lookup capabilities of the WhatsApp side.
#[async_trait]
pub trait WhatsAppClient: Send + Sync {
    /// Resolve the true conversation behind an event (group vs direct).
    async fn resolve_conversation(
        &self,
        event: &WhatsAppEvent,
    ) -> Result<Conversation, ClientError>;

    /// Download the media payload attached to an event.
    async fn download_media(&self, event: &WhatsAppEvent) -> Result<MediaPayload, ClientError>;

    /// Send plain text to a conversation.
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<(), ClientError>;

    /// Send a local file to a conversation, with an optional caption.
    async fn send_attachment(
        &self,
        conversation_id: &str,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), ClientError>;

    /// Whether the underlying session is currently usable.
    fn is_ready(&self) -> bool;

    /// Attempt to re-establish the underlying session.
    async fn reconnect(&self) -> Result<(), ClientError>;
}

/// Sending capabilities of the Discord side.
#[async_trait]
pub trait DiscordClient: Send + Sync {
    /// Send plain text to a channel.
    async fn send_text(&self, channel_id: &str, content: &str) -> Result<(), ClientError>;

    /// Send a local file to a channel, optionally with message text.
    async fn send_file(
        &self,
        channel_id: &str,
        content: Option<&str>,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ClientError>;

    /// Whether the client can currently reach the API.
    fn is_ready(&self) -> bool;

    /// Attempt to re-establish API reachability.
    async fn reconnect(&self) -> Result<(), ClientError>;
}

/// Drive a stream of WhatsApp events into a handler.
///
/// Handler errors are logged and do not stop the loop; the loop ends when the
/// stream does.
pub fn spawn_whatsapp_loop<H, Fut>(mut events: EventStream<WhatsAppEvent>, handler: H) -> JoinHandle<()>
where
    H: Fn(WhatsAppEvent) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), crate::error::RelayError>> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = handler(event).await {
                tracing::error!(error = %e, "WhatsApp event handler failed");
            }
        }
        tracing::info!("WhatsApp event stream closed");
    })
}

/// Drive a stream of Discord events into a handler.
pub fn spawn_discord_loop<H, Fut>(mut events: EventStream<DiscordEvent>, handler: H) -> JoinHandle<()>
where
    H: Fn(DiscordEvent) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), crate::error::RelayError>> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let Err(e) = handler(event).await {
                tracing::error!(error = %e, "Discord event handler failed");
            }
        }
        tracing::info!("Discord event stream closed");
    })
}

/// Wrap a tokio mpsc receiver into an [`EventStream`].
pub fn stream_from_receiver<T: Send + 'static>(
    rx: tokio::sync::mpsc::UnboundedReceiver<T>,
) -> EventStream<T> {
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

/// Shared handles to both platform clients.
#[derive(Clone)]
pub struct Clients {
    pub whatsapp: Arc<dyn WhatsAppClient>,
    pub discord: Arc<dyn DiscordClient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_kind_labels() {
        assert_eq!(ConversationKind::Direct.label(), "Privat");
        let group = ConversationKind::Group {
            name: "Familie".into(),
        };
        assert_eq!(group.label(), "Familie");
    }

    #[tokio::test]
    async fn stream_from_receiver_yields_in_order() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(1u32).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        let mut stream = stream_from_receiver(rx);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn event_loop_survives_handler_errors() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let handle = spawn_discord_loop(stream_from_receiver(rx), move |event: DiscordEvent| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.lock().unwrap().push(event.content.clone());
                if event.content == "boom" {
                    return Err(crate::error::RelayError::Delivery(
                        ClientError::SendFailed {
                            platform: "discord".into(),
                            reason: "boom".into(),
                        },
                    ));
                }
                Ok(())
            }
        });

        for content in ["boom", "after"] {
            tx.send(DiscordEvent {
                content: content.into(),
                author: "tester".into(),
                channel_id: "c1".into(),
                attachments: vec![],
            })
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["boom", "after"]);
    }
}
