//! Recording mock clients for relay unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::attachments::{AttachmentFetcher, ScratchStore};
use crate::bridge::{BridgeDeps, CorrelationStore};
use crate::clients::{
    Conversation, ConversationKind, DiscordClient, MediaPayload, WhatsAppClient, WhatsAppEvent,
};
use crate::config::BridgeConfig;
use crate::error::{AttachmentError, ClientError};

/// One file send captured by [`MockDiscord`] or [`MockWhatsApp`].
#[derive(Debug, Clone)]
pub struct SentFile {
    pub destination: String,
    pub content: Option<String>,
    pub path: PathBuf,
    pub file_name: String,
    /// Bytes read at send time — proves the scratch file existed then.
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct MockDiscord {
    texts: Mutex<Vec<(String, String)>>,
    files: Mutex<Vec<SentFile>>,
    fail_remaining: AtomicU32,
    ready: AtomicBool,
}

impl MockDiscord {
    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_files(&self) -> Vec<SentFile> {
        self.files.lock().unwrap().clone()
    }

    /// Make the next `n` sends fail with a network-style error.
    pub fn fail_next_sends(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), ClientError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::SendFailed {
                platform: "discord".into(),
                reason: "mock network failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DiscordClient for MockDiscord {
    async fn send_text(&self, channel_id: &str, content: &str) -> Result<(), ClientError> {
        self.check_failure()?;
        self.texts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn send_file(
        &self,
        channel_id: &str,
        content: Option<&str>,
        path: &Path,
        file_name: &str,
    ) -> Result<(), ClientError> {
        self.check_failure()?;
        let bytes = std::fs::read(path).map_err(|e| ClientError::SendFailed {
            platform: "discord".into(),
            reason: e.to_string(),
        })?;
        self.files.lock().unwrap().push(SentFile {
            destination: channel_id.to_string(),
            content: content.map(str::to_string),
            path: path.to_path_buf(),
            file_name: file_name.to_string(),
            bytes,
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), ClientError> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockWhatsApp {
    conversation: Mutex<Option<Conversation>>,
    media: Mutex<Option<MediaPayload>>,
    texts: Mutex<Vec<(String, String)>>,
    files: Mutex<Vec<SentFile>>,
    fail_remaining: AtomicU32,
    ready: AtomicBool,
}

impl MockWhatsApp {
    /// Override the resolved conversation (defaults to a direct chat with
    /// the event's sender address).
    pub fn set_conversation(&self, id: &str, kind: ConversationKind) {
        *self.conversation.lock().unwrap() = Some(Conversation {
            id: id.to_string(),
            kind,
        });
    }

    pub fn set_media(&self, data: Vec<u8>, filename: Option<String>) {
        *self.media.lock().unwrap() = Some(MediaPayload {
            data,
            filename,
            mime_type: None,
        });
    }

    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_files(&self) -> Vec<SentFile> {
        self.files.lock().unwrap().clone()
    }

    pub fn fail_next_sends(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), ClientError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::SendFailed {
                platform: "whatsapp".into(),
                reason: "mock network failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl WhatsAppClient for MockWhatsApp {
    async fn resolve_conversation(
        &self,
        event: &WhatsAppEvent,
    ) -> Result<Conversation, ClientError> {
        if let Some(conversation) = self.conversation.lock().unwrap().clone() {
            return Ok(conversation);
        }
        Ok(Conversation {
            id: event.from.clone(),
            kind: ConversationKind::Direct,
        })
    }

    async fn download_media(&self, _event: &WhatsAppEvent) -> Result<MediaPayload, ClientError> {
        self.media
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::MediaDownload("no media staged in mock".into()))
    }

    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<(), ClientError> {
        self.check_failure()?;
        self.texts
            .lock()
            .unwrap()
            .push((conversation_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_attachment(
        &self,
        conversation_id: &str,
        path: &Path,
        caption: Option<&str>,
    ) -> Result<(), ClientError> {
        self.check_failure()?;
        let bytes = std::fs::read(path).map_err(|e| ClientError::SendFailed {
            platform: "whatsapp".into(),
            reason: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();
        self.files.lock().unwrap().push(SentFile {
            destination: conversation_id.to_string(),
            content: caption.map(str::to_string),
            path: path.to_path_buf(),
            file_name,
            bytes,
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), ClientError> {
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// URL → canned bytes fetcher.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockFetcher {
    pub fn stage(&self, url: &str, bytes: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
    }
}

#[async_trait]
impl AttachmentFetcher for MockFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AttachmentError> {
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AttachmentError::Download {
                url: url.to_string(),
                reason: "no response staged in mock".into(),
            })
    }
}

/// Build deps over fresh mocks and a per-test scratch directory.
pub fn deps_full(
    config: BridgeConfig,
) -> (
    Arc<BridgeDeps>,
    Arc<MockDiscord>,
    Arc<MockWhatsApp>,
    Arc<MockFetcher>,
) {
    let discord = Arc::new(MockDiscord::default());
    let whatsapp = Arc::new(MockWhatsApp::default());
    let fetcher = Arc::new(MockFetcher::default());
    let scratch_dir = std::env::temp_dir().join(format!("wa-bridge-test-{}", uuid::Uuid::new_v4()));
    let deps = Arc::new(BridgeDeps {
        config,
        store: Arc::new(CorrelationStore::new()),
        whatsapp: whatsapp.clone() as Arc<dyn WhatsAppClient>,
        discord: discord.clone() as Arc<dyn DiscordClient>,
        fetcher: fetcher.clone() as Arc<dyn AttachmentFetcher>,
        scratch: ScratchStore::new(scratch_dir),
    });
    (deps, discord, whatsapp, fetcher)
}

pub fn deps_with(
    config: BridgeConfig,
) -> (Arc<BridgeDeps>, Arc<MockDiscord>, Arc<MockWhatsApp>) {
    let (deps, discord, whatsapp, _fetcher) = deps_full(config);
    (deps, discord, whatsapp)
}
