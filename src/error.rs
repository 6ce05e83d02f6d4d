//! Error types for the bridge engine.
//!
//! Per-subsystem enums; the relay handlers fold client and attachment
//! failures into [`RelayError`] via `#[from]`.

use std::path::PathBuf;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Platform client errors (WhatsApp / Discord sends and lookups).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Client {platform} is not ready")]
    NotReady { platform: String },

    #[error("Channel not found: {id}")]
    ChannelNotFound { id: String },

    #[error("Failed to send on {platform}: {reason}")]
    SendFailed { platform: String, reason: String },

    #[error("Failed to resolve conversation for {address}: {reason}")]
    ConversationLookup { address: String, reason: String },

    #[error("Media download failed: {0}")]
    MediaDownload(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Attachment transfer errors (download, scratch file I/O).
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to write scratch file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read scratch file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Relay-path errors surfaced by the inbound and reply handlers.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Delivery to bridge channel failed: {0}")]
    Delivery(#[from] ClientError),

    #[error("Attachment handling failed: {0}")]
    Attachment(#[from] AttachmentError),
}
