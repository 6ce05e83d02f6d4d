//! Attachment transfer — remote bytes in, transient scratch files out.
//!
//! Every attachment crossing the bridge takes the same path: download bytes,
//! write them to a uniquely named scratch file, hand the path to a send
//! operation, delete the file. Scratch files are transient by contract —
//! steady-state disk usage is bounded by in-flight traffic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AttachmentError;

/// Extensions relayed as inline message text instead of files.
const INLINE_TEXT_EXTENSIONS: &[&str] = &["txt", "text", "log"];

/// Downloads raw bytes for a remote attachment URL.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AttachmentError>;
}

/// `reqwest`-backed fetcher for Discord CDN attachment URLs.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachmentFetcher for HttpFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, AttachmentError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttachmentError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(AttachmentError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| AttachmentError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Scratch-file store for in-flight attachments.
#[derive(Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Create the scratch directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<(), AttachmentError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write bytes to a uniquely named scratch file and return its path.
    ///
    /// The display name is kept as a suffix so the forwarded file keeps a
    /// recognizable name; a UUID prefix prevents collisions between
    /// concurrent transfers of equally named files.
    pub async fn write(&self, display_name: &str, bytes: &[u8]) -> Result<PathBuf, AttachmentError> {
        self.ensure_dir().await?;
        let unique = format!("{}-{}", Uuid::new_v4(), sanitize_name(display_name));
        let path = self.dir.join(unique);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AttachmentError::Write {
                path: path.clone(),
                source: e,
            })?;
        Ok(path)
    }

    /// Delete a scratch file now. Missing files are not an error.
    pub async fn delete(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Scratch file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
        }
    }

    /// Delete a scratch file after a linger, without blocking the caller.
    pub fn schedule_delete(&self, path: PathBuf, linger: Duration) {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            store.delete(&path).await;
        });
    }

    /// Read a scratch file back as UTF-8 text (inline relay of text files).
    pub async fn read_text(&self, path: &Path) -> Result<String, AttachmentError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AttachmentError::Read {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

/// Whether a file name should be relayed inline as message text.
pub fn is_plain_text(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            INLINE_TEXT_EXTENSIONS
                .iter()
                .any(|t| ext.eq_ignore_ascii_case(t))
        })
        .unwrap_or(false)
}

/// Strip path separators out of a client-supplied file name.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}
