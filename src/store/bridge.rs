//! Bridge from in-memory session buffers to the key-value store.
//!
//! Writes are best-effort snapshots: each one carries the full current value
//! of the fields it names, so a failed or superseded write is recovered by
//! the next one. Failures are logged, never retried, never surfaced.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{keys, KeyValueStore};
use crate::capture::types::{ChatMessage, TranscriptBlock};

/// Downstream collaborator notified of session boundaries.
#[async_trait]
pub trait SessionSink: Send + Sync {
    /// Sent once when the start condition is detected. No response expected.
    async fn session_started(&self) -> Result<()>;
    /// Sent once after the final persistence at session end.
    async fn session_ended(&self) -> Result<()>;
}

/// Sink that only logs. Used when no finalization collaborator is wired.
pub struct LogSink;

#[async_trait]
impl SessionSink for LogSink {
    async fn session_started(&self) -> Result<()> {
        info!("New session started");
        Ok(())
    }

    async fn session_ended(&self) -> Result<()> {
        info!("Session ended");
        Ok(())
    }
}

/// The subset of session fields one write names. Unnamed fields keep their
/// stored values.
#[derive(Default)]
pub struct SavedFields<'a> {
    pub transcript: Option<&'a [TranscriptBlock]>,
    pub chat_messages: Option<&'a [ChatMessage]>,
    pub meeting_title: Option<&'a str>,
    pub meeting_start_timestamp: Option<&'a str>,
}

pub struct StoreBridge {
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn SessionSink>,
}

impl StoreBridge {
    pub fn new(store: Arc<dyn KeyValueStore>, sink: Arc<dyn SessionSink>) -> Self {
        Self { store, sink }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Announce session start to the downstream collaborator. Fire and
    /// forget; a failure is logged only.
    pub async fn signal_session_started(&self) {
        if let Err(e) = self.sink.session_started().await {
            error!("Session start signal failed: {:#}", e);
        }
    }

    /// Persist the named fields as one unit. With `end_of_session`, a
    /// successful write is followed by the session-ended signal; a sink
    /// failure is logged, not retried, and never escalated.
    pub async fn save(&self, fields: SavedFields<'_>, end_of_session: bool) {
        let mut entries = Map::new();
        if let Some(transcript) = fields.transcript {
            entries.insert(keys::TRANSCRIPT.to_string(), json!(transcript));
        }
        if let Some(chat) = fields.chat_messages {
            entries.insert(keys::CHAT_MESSAGES.to_string(), json!(chat));
        }
        if let Some(title) = fields.meeting_title {
            entries.insert(keys::MEETING_TITLE.to_string(), json!(title));
        }
        if let Some(start) = fields.meeting_start_timestamp {
            entries.insert(keys::MEETING_START_TIMESTAMP.to_string(), json!(start));
        }

        if let Err(e) = self.store.set(entries) {
            error!("Failed to persist session state: {:#}", e);
            return;
        }
        debug!("Session state persisted");

        if end_of_session {
            if let Err(e) = self.sink.session_ended().await {
                error!("Session end signal failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        started: AtomicUsize,
        ended: AtomicUsize,
        fail_ended: bool,
    }

    #[async_trait]
    impl SessionSink for CountingSink {
        async fn session_started(&self) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn session_ended(&self) -> Result<()> {
            self.ended.fetch_add(1, Ordering::SeqCst);
            if self.fail_ended {
                anyhow::bail!("downstream export failed");
            }
            Ok(())
        }
    }

    fn block(name: &str, text: &str) -> TranscriptBlock {
        TranscriptBlock {
            person_name: name.to_string(),
            timestamp: "2026-08-29T10:00:00+00:00".to_string(),
            transcript_text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_writes_only_named_fields() {
        let store = Arc::new(MemoryStore::new());
        let bridge = StoreBridge::new(store.clone(), Arc::new(LogSink));

        bridge
            .save(
                SavedFields {
                    meeting_title: Some("Standup"),
                    meeting_start_timestamp: Some("2026-08-29T10:00:00+00:00"),
                    ..Default::default()
                },
                false,
            )
            .await;

        let blocks = [block("Bob", "hi")];
        bridge
            .save(
                SavedFields {
                    transcript: Some(&blocks),
                    ..Default::default()
                },
                false,
            )
            .await;

        let state = store
            .get(&[keys::MEETING_TITLE, keys::TRANSCRIPT])
            .unwrap();
        assert_eq!(state[keys::MEETING_TITLE], json!("Standup"));
        assert_eq!(state[keys::TRANSCRIPT].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_end_of_session_signals_sink_once() {
        let sink = Arc::new(CountingSink::default());
        let bridge = StoreBridge::new(Arc::new(MemoryStore::new()), sink.clone());

        bridge.save(SavedFields::default(), false).await;
        assert_eq!(sink.ended.load(Ordering::SeqCst), 0);

        bridge.save(SavedFields::default(), true).await;
        assert_eq!(sink.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_propagate() {
        let sink = Arc::new(CountingSink {
            fail_ended: true,
            ..Default::default()
        });
        let bridge = StoreBridge::new(Arc::new(MemoryStore::new()), sink.clone());

        // Must not panic or error out
        bridge.save(SavedFields::default(), true).await;
        assert_eq!(sink.ended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeat_save_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let bridge = StoreBridge::new(store.clone(), Arc::new(LogSink));

        let blocks = [block("Bob", "hi")];
        for _ in 0..2 {
            bridge
                .save(
                    SavedFields {
                        transcript: Some(&blocks),
                        ..Default::default()
                    },
                    false,
                )
                .await;
        }

        let state = store.get(&[keys::TRANSCRIPT]).unwrap();
        assert_eq!(state[keys::TRANSCRIPT].as_array().unwrap().len(), 1);
    }
}
