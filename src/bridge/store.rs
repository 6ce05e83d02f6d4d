//! Correlation store — the only shared mutable state of the engine.
//!
//! A `Vec` behind a `tokio::sync::RwLock`: insertion order doubles as
//! iteration order, and whole-record granularity keeps the locking coarse.
//! Both relay paths and the sweeper mutate through the operations here;
//! relay code never iterates the collection directly. Reply matching is
//! first-active-wins, and the match+append in batch mode happens under a
//! single write lock so a record deleted concurrently is never appended to.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::bridge::record::{BridgeRecord, ReplyEntry};

/// In-memory map from bridge id to bridge record.
#[derive(Default)]
pub struct CorrelationStore {
    records: RwLock<Vec<BridgeRecord>>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. The record is visible to the reply path from this
    /// instant until it is deleted.
    pub async fn put(&self, record: BridgeRecord) {
        self.records.write().await.push(record);
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &str) -> Option<BridgeRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    /// Remove a record by id, returning it. After this the record can never
    /// be matched again.
    pub async fn delete(&self, id: &str) -> Option<BridgeRecord> {
        let mut records = self.records.write().await;
        let idx = records.iter().position(|r| r.id == id)?;
        Some(records.remove(idx))
    }

    /// First record still within its active window, in insertion order.
    pub async fn first_active(&self, now: DateTime<Utc>) -> Option<BridgeRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.is_active(now))
            .cloned()
    }

    /// Snapshot of all records within their active window, insertion order.
    pub async fn active_records(&self, now: DateTime<Utc>) -> Vec<BridgeRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.is_active(now))
            .cloned()
            .collect()
    }

    /// Append a reply entry to the first active record, returning its id.
    ///
    /// Match and append happen under one write lock: a record that expired
    /// or was deleted since the caller last looked can't receive the entry.
    pub async fn append_reply_first_active(
        &self,
        entry: ReplyEntry,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let mut records = self.records.write().await;
        let record = records.iter_mut().find(|r| r.is_active(now))?;
        record.replies.push(entry);
        Some(record.id.clone())
    }

    /// Delete every record older than the retention ceiling, returning the
    /// removed ids. Safety net independent of per-record windows.
    pub async fn sweep_expired(&self, ceiling: Duration, now: DateTime<Utc>) -> Vec<String> {
        let mut records = self.records.write().await;
        let mut reaped = Vec::new();
        records.retain(|r| {
            if r.age(now) > ceiling {
                reaped.push(r.id.clone());
                false
            } else {
                true
            }
        });
        reaped
    }

    /// Number of records currently within their active window.
    pub async fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.is_active(now))
            .count()
    }

    /// Total number of records, active or inert.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ConversationKind;

    fn record(conversation: &str, window_secs: u64) -> BridgeRecord {
        BridgeRecord::new(
            conversation.into(),
            ConversationKind::Direct,
            Duration::from_secs(window_secs),
        )
    }

    fn aged(conversation: &str, window_secs: u64, age_secs: i64) -> BridgeRecord {
        let mut rec = record(conversation, window_secs);
        rec.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
        rec
    }

    fn entry(text: &str) -> ReplyEntry {
        ReplyEntry {
            text: text.into(),
            author: "discord-user".into(),
            attachments: vec![],
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_get_delete() {
        let store = CorrelationStore::new();
        let rec = record("chat-a", 120);
        let id = rec.id.clone();

        store.put(rec).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&id).await.unwrap().conversation_id, "chat-a");

        let removed = store.delete(&id).await.unwrap();
        assert_eq!(removed.id, id);
        assert!(store.get(&id).await.is_none());
        assert!(store.delete(&id).await.is_none());
    }

    #[tokio::test]
    async fn first_active_respects_insertion_order() {
        let store = CorrelationStore::new();
        let first = record("chat-a", 120);
        let first_id = first.id.clone();
        store.put(first).await;
        store.put(record("chat-b", 120)).await;

        let hit = store.first_active(Utc::now()).await.unwrap();
        assert_eq!(hit.id, first_id);
    }

    #[tokio::test]
    async fn first_active_skips_inert_records() {
        let store = CorrelationStore::new();
        store.put(aged("chat-old", 120, 121)).await;
        let fresh = record("chat-new", 120);
        let fresh_id = fresh.id.clone();
        store.put(fresh).await;

        let hit = store.first_active(Utc::now()).await.unwrap();
        assert_eq!(hit.id, fresh_id);
        // The inert record is skipped but still physically present.
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn append_goes_to_first_active_only() {
        let store = CorrelationStore::new();
        let first = record("chat-a", 120);
        let first_id = first.id.clone();
        store.put(first).await;
        let second = record("chat-b", 120);
        let second_id = second.id.clone();
        store.put(second).await;

        let matched = store
            .append_reply_first_active(entry("pong"), Utc::now())
            .await;
        assert_eq!(matched.as_deref(), Some(first_id.as_str()));
        assert_eq!(store.get(&first_id).await.unwrap().replies.len(), 1);
        assert!(store.get(&second_id).await.unwrap().replies.is_empty());
    }

    #[tokio::test]
    async fn append_fails_when_nothing_active() {
        let store = CorrelationStore::new();
        store.put(aged("chat-old", 120, 121)).await;

        let matched = store
            .append_reply_first_active(entry("too late"), Utc::now())
            .await;
        assert!(matched.is_none());
    }

    #[tokio::test]
    async fn appends_preserve_receipt_order() {
        let store = CorrelationStore::new();
        let rec = record("chat-a", 120);
        let id = rec.id.clone();
        store.put(rec).await;

        for text in ["one", "two", "three"] {
            store
                .append_reply_first_active(entry(text), Utc::now())
                .await
                .unwrap();
        }

        let replies = store.get(&id).await.unwrap().replies;
        let texts: Vec<&str> = replies.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn sweep_reaps_only_past_ceiling() {
        let store = CorrelationStore::new();
        // Past its window but under the ceiling: stays.
        store.put(aged("chat-inert", 120, 600)).await;
        // Past the ceiling: reaped.
        let old = aged("chat-ancient", 120, 3700);
        let old_id = old.id.clone();
        store.put(old).await;
        store.put(record("chat-fresh", 120)).await;

        let reaped = store
            .sweep_expired(Duration::from_secs(3600), Utc::now())
            .await;
        assert_eq!(reaped, vec![old_id]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn active_count_excludes_inert() {
        let store = CorrelationStore::new();
        store.put(aged("chat-inert", 120, 600)).await;
        store.put(record("chat-fresh", 120)).await;

        assert_eq!(store.active_count(Utc::now()).await, 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_mutation_is_safe() {
        let store = std::sync::Arc::new(CorrelationStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let rec = record(&format!("chat-{i}"), 120);
                let id = rec.id.clone();
                store.put(rec).await;
                store
                    .append_reply_first_active(entry("hi"), Utc::now())
                    .await;
                id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }

        assert_eq!(store.len().await, 32);
        let total_replies: usize = {
            let mut sum = 0;
            for id in &ids {
                sum += store.get(id).await.unwrap().replies.len();
            }
            sum
        };
        // Every append landed somewhere, none lost.
        assert_eq!(total_replies, 32);
    }
}
