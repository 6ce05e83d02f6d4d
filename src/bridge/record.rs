//! Bridge records — correlation state for one forwarded message.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clients::ConversationKind;

/// Correlation state linking one forwarded WhatsApp message to its Discord
/// reply window.
#[derive(Debug, Clone)]
pub struct BridgeRecord {
    /// Opaque unique token, generated at creation.
    pub id: String,
    /// Resolved conversation id of the originating WhatsApp chat. For groups
    /// this is the group's own address, never the participant who sent.
    pub conversation_id: String,
    /// Direct vs group, with the group display name.
    pub kind: ConversationKind,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Duration after `created_at` during which replies are accepted.
    pub active_window: Duration,
    /// Collected replies, batch mode only. Immediate mode never appends.
    pub replies: Vec<ReplyEntry>,
}

/// One collected Discord reply (batch mode).
#[derive(Debug, Clone)]
pub struct ReplyEntry {
    pub text: String,
    pub author: String,
    pub attachments: Vec<AttachmentRef>,
    pub received_at: DateTime<Utc>,
}

/// A downloaded attachment waiting on disk for the flush.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub display_name: String,
    pub local_path: PathBuf,
    pub mime_type: Option<String>,
}

impl BridgeRecord {
    pub fn new(conversation_id: String, kind: ConversationKind, active_window: Duration) -> Self {
        Self {
            id: new_record_id(),
            conversation_id,
            kind,
            created_at: Utc::now(),
            active_window,
            replies: Vec::new(),
        }
    }

    /// Sole admission test for reply attribution: within the active window a
    /// record accepts replies, past it the record is inert even while still
    /// physically present.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age <= self.active_window,
            // `now` before `created_at` (clock skew): treat as active.
            Err(_) => true,
        }
    }

    /// Age of the record, zero if the clock went backwards.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Generate a record id: millisecond timestamp prefix + random hex suffix.
/// Unique for the lifetime of the process; no global counter.
fn new_record_id() -> String {
    format!(
        "{}-{:08x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}
