//! WhatsApp ↔ Discord bridge — correlation engine.
//!
//! Forwards trigger-prefixed WhatsApp messages to a fixed Discord channel
//! and relays Discord replies back to the originating conversation while a
//! per-message correlation record is within its active window. Platform
//! connections (WhatsApp Web session, Discord gateway) live in the embedder
//! and are consumed through the traits in [`clients`].

pub mod attachments;
pub mod bridge;
pub mod clients;
pub mod config;
pub mod error;
pub mod health;
