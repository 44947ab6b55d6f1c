//! Captured meeting data model.
//!
//! Serde field names match the persisted wire shape consumed by the popup
//! layer, so stored JSON is directly interchangeable with it.

use serde::{Deserialize, Serialize};

/// One contiguous speaking turn by one person. Immutable once appended to
/// the transcript sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptBlock {
    #[serde(rename = "personName")]
    pub person_name: String,
    /// ISO-8601, captured when the turn's buffer was first opened.
    pub timestamp: String,
    #[serde(rename = "transcriptText")]
    pub transcript_text: String,
}

/// One chat message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "personName")]
    pub person_name: String,
    /// ISO-8601, captured when the message was first observed.
    pub timestamp: String,
    #[serde(rename = "chatMessageText")]
    pub chat_message_text: String,
}

/// Session metadata, set once at session start. The title may be replaced
/// once mid-session when the host page reveals a better one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    #[serde(rename = "meetingTitle")]
    pub meeting_title: String,
    #[serde(rename = "meetingStartTimestamp")]
    pub meeting_start_timestamp: String,
}

pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339()
}
