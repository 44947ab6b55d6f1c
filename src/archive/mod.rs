//! Finalized meeting archive.
//!
//! When a session ends, the live key-value snapshot is frozen into one
//! archived meeting row and exported as a plain-text file. The archive also
//! backs the `meetings` CLI commands and last-meeting recovery.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::{params, Connection};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capture::types::{now_iso8601, ChatMessage, TranscriptBlock};
use crate::store::bridge::SessionSink;
use crate::store::sqlite::SqliteStore;
use crate::store::{keys, KeyValueStore};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            meeting_start_timestamp TEXT NOT NULL,
            meeting_end_timestamp TEXT NOT NULL,
            transcript TEXT NOT NULL,
            chat_messages TEXT NOT NULL,
            export_path TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_started ON meetings(meeting_start_timestamp DESC)",
        [],
    )
    .context("Failed to create index on meeting_start_timestamp")?;

    Ok(())
}

/// An archived meeting row.
#[derive(Debug, Clone)]
pub struct MeetingRecord {
    pub id: i64,
    pub title: String,
    pub meeting_start_timestamp: String,
    pub meeting_end_timestamp: String,
    pub transcript: Vec<TranscriptBlock>,
    pub chat_messages: Vec<ChatMessage>,
    pub export_path: Option<String>,
}

/// Repository for archived meetings. Raw SQL, shared database file with the
/// kv store.
pub struct MeetingRepository;

impl MeetingRepository {
    pub fn insert(
        conn: &Connection,
        title: &str,
        start: &str,
        end: &str,
        transcript: &[TranscriptBlock],
        chat_messages: &[ChatMessage],
        export_path: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO meetings (title, meeting_start_timestamp, meeting_end_timestamp, \
             transcript, chat_messages, export_path) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                title,
                start,
                end,
                serde_json::to_string(transcript)?,
                serde_json::to_string(chat_messages)?,
                export_path,
            ],
        )
        .context("Failed to insert meeting")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<MeetingRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, title, meeting_start_timestamp, meeting_end_timestamp, \
                 transcript, chat_messages, export_path FROM meetings WHERE id = ?1",
            )
            .context("Failed to prepare meeting query")?;

        let mut rows = stmt
            .query_map(params![id], Self::map_row)
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List meetings, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<MeetingRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, title, meeting_start_timestamp, meeting_end_timestamp, \
                 transcript, chat_messages, export_path FROM meetings \
                 ORDER BY meeting_start_timestamp DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }
        Ok(meetings)
    }

    pub fn newest(conn: &Connection) -> Result<Option<MeetingRecord>> {
        Ok(Self::list(conn, 1)?.into_iter().next())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingRecord> {
        let id: i64 = row.get(0)?;
        let transcript_json: String = row.get(4)?;
        let chat_json: String = row.get(5)?;
        // A damaged row still lists, but not silently.
        let transcript = serde_json::from_str(&transcript_json).unwrap_or_else(|e| {
            warn!("Meeting {} has corrupt transcript JSON: {}", id, e);
            Vec::new()
        });
        let chat_messages = serde_json::from_str(&chat_json).unwrap_or_else(|e| {
            warn!("Meeting {} has corrupt chat JSON: {}", id, e);
            Vec::new()
        });
        Ok(MeetingRecord {
            id,
            title: row.get(1)?,
            meeting_start_timestamp: row.get(2)?,
            meeting_end_timestamp: row.get(3)?,
            transcript,
            chat_messages,
            export_path: row.get(6)?,
        })
    }
}

/// Outcome of a recovery attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RecoverOutcome {
    Recovered(i64),
    NothingToRecover,
}

/// The live snapshot of an unfinished or just-finished session, read back
/// from the kv store.
struct SessionSnapshot {
    title: String,
    start: String,
    transcript: Vec<TranscriptBlock>,
    chat_messages: Vec<ChatMessage>,
}

pub struct MeetingArchive {
    store: Arc<SqliteStore>,
    export_dir: PathBuf,
}

impl MeetingArchive {
    pub fn new(store: Arc<SqliteStore>, export_dir: PathBuf) -> Self {
        Self { store, export_dir }
    }

    /// Freeze the current kv snapshot into an archived meeting and write its
    /// text export.
    pub fn finalize_current(&self) -> Result<i64> {
        let snapshot = self.read_snapshot()?;
        if snapshot.transcript.is_empty() && snapshot.chat_messages.is_empty() {
            bail!("Empty transcript and empty chatMessages");
        }
        self.archive_snapshot(&snapshot)
    }

    /// Archive the live snapshot if the last session never got finalized
    /// (e.g. the page was closed without leaving the call).
    pub fn recover_last(&self) -> Result<RecoverOutcome> {
        let snapshot = self.read_snapshot()?;
        if snapshot.transcript.is_empty() && snapshot.chat_messages.is_empty() {
            return Ok(RecoverOutcome::NothingToRecover);
        }

        let already_archived = self.store.with_conn(|conn| {
            Ok(MeetingRepository::newest(conn)?
                .map(|m| m.meeting_start_timestamp == snapshot.start)
                .unwrap_or(false))
        })?;
        if already_archived {
            return Ok(RecoverOutcome::NothingToRecover);
        }

        let id = self.archive_snapshot(&snapshot)?;
        Ok(RecoverOutcome::Recovered(id))
    }

    fn archive_snapshot(&self, snapshot: &SessionSnapshot) -> Result<i64> {
        let end = now_iso8601();
        let content = format_meeting_text(
            &snapshot.title,
            &snapshot.start,
            &end,
            &snapshot.transcript,
            &snapshot.chat_messages,
        );

        let export_path = match self.write_export(&snapshot.start, &content) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Failed to write meeting export: {:#}", e);
                None
            }
        };

        let id = self.store.with_conn(|conn| {
            MeetingRepository::insert(
                conn,
                &snapshot.title,
                &snapshot.start,
                &end,
                &snapshot.transcript,
                &snapshot.chat_messages,
                export_path.as_deref(),
            )
        })?;

        info!(
            "Meeting {} archived ({} blocks, {} chat messages)",
            id,
            snapshot.transcript.len(),
            snapshot.chat_messages.len()
        );
        Ok(id)
    }

    fn read_snapshot(&self) -> Result<SessionSnapshot> {
        let state = self.store.get(&[
            keys::MEETING_TITLE,
            keys::MEETING_START_TIMESTAMP,
            keys::TRANSCRIPT,
            keys::CHAT_MESSAGES,
        ])?;

        let title = state
            .get(keys::MEETING_TITLE)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Meeting")
            .to_string();
        let start = state
            .get(keys::MEETING_START_TIMESTAMP)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let transcript = state
            .get(keys::TRANSCRIPT)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .context("Failed to parse stored transcript")?
            .unwrap_or_default();
        let chat_messages = state
            .get(keys::CHAT_MESSAGES)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .context("Failed to parse stored chat messages")?
            .unwrap_or_default();

        Ok(SessionSnapshot {
            title,
            start,
            transcript,
            chat_messages,
        })
    }

    fn write_export(&self, start: &str, content: &str) -> Result<String> {
        std::fs::create_dir_all(&self.export_dir).context("Failed to create export directory")?;

        let stamp = DateTime::parse_from_rfc3339(start)
            .map(|dt| dt.format("%Y%m%d-%H%M%S").to_string())
            .unwrap_or_else(|_| chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());

        let mut path = self.export_dir.join(format!("meeting-{}.txt", stamp));
        // Handle collision by appending counter
        if path.exists() {
            for i in 1..100 {
                let alt = self.export_dir.join(format!("meeting-{}-{}.txt", stamp, i));
                if !alt.exists() {
                    path = alt;
                    break;
                }
            }
        }

        std::fs::write(&path, content).context("Failed to write export file")?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Seed the status record so capture runs on the next session.
    pub fn ensure_capture_status(&self) -> Result<()> {
        let mut entries = serde_json::Map::new();
        entries.insert(
            keys::CAPTURE_STATUS.to_string(),
            json!({
                "status": 200,
                "message": "<strong>Meeting capture is running</strong> <br /> Do not turn off captions",
            }),
        );
        self.store.set(entries)
    }
}

#[async_trait]
impl SessionSink for MeetingArchive {
    async fn session_started(&self) -> Result<()> {
        info!("New session started");
        Ok(())
    }

    async fn session_ended(&self) -> Result<()> {
        self.finalize_current().map(|_| ())
    }
}

/// Render an archived meeting as the plain-text export consumed outside the
/// engine (and by the analysis backend).
pub fn format_meeting_text(
    title: &str,
    start: &str,
    end: &str,
    transcript: &[TranscriptBlock],
    chat_messages: &[ChatMessage],
) -> String {
    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&format!("Started: {}\n", start));
    out.push_str(&format!("Duration: {}\n", duration_string(start, end)));

    out.push_str("\nTRANSCRIPT\n-----------------\n\n");
    if transcript.is_empty() {
        out.push_str("(no captions captured)\n");
    }
    for block in transcript {
        out.push_str(&format!(
            "{} ({})\n{}\n\n",
            block.person_name, block.timestamp, block.transcript_text
        ));
    }

    if !chat_messages.is_empty() {
        out.push_str("\nCHAT\n-----------------\n\n");
        for message in chat_messages {
            out.push_str(&format!(
                "{} ({}): {}\n",
                message.person_name, message.timestamp, message.chat_message_text
            ));
        }
    }

    out
}

/// Human duration between two ISO timestamps, e.g. "1h 5m" or "32m".
pub fn duration_string(start: &str, end: &str) -> String {
    let parsed = (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    );
    let (Ok(start), Ok(end)) = parsed else {
        return "unknown".to_string();
    };
    let minutes = (end - start).num_minutes().max(0);
    let hours = minutes / 60;
    let remaining = minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, remaining)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::TempDir;

    fn seed_session(store: &SqliteStore, title: &str, start: &str) {
        let mut entries = Map::new();
        entries.insert(keys::MEETING_TITLE.to_string(), json!(title));
        entries.insert(keys::MEETING_START_TIMESTAMP.to_string(), json!(start));
        entries.insert(
            keys::TRANSCRIPT.to_string(),
            json!([{
                "personName": "Bob",
                "timestamp": start,
                "transcriptText": "Hi there everyone",
            }]),
        );
        entries.insert(
            keys::CHAT_MESSAGES.to_string(),
            json!([{
                "personName": "Alice",
                "timestamp": start,
                "chatMessageText": "Hello world",
            }]),
        );
        store.set(entries).unwrap();
    }

    fn archive_in(dir: &TempDir) -> (Arc<SqliteStore>, MeetingArchive) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let archive = MeetingArchive::new(store.clone(), dir.path().to_path_buf());
        (store, archive)
    }

    #[test]
    fn test_finalize_archives_snapshot_and_exports() {
        let dir = TempDir::new().unwrap();
        let (store, archive) = archive_in(&dir);
        seed_session(&store, "Standup", "2026-08-29T10:00:00+00:00");

        let id = archive.finalize_current().unwrap();

        let record = store
            .with_conn(|conn| MeetingRepository::get(conn, id))
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Standup");
        assert_eq!(record.transcript.len(), 1);
        assert_eq!(record.chat_messages.len(), 1);

        let export = record.export_path.unwrap();
        let content = std::fs::read_to_string(export).unwrap();
        assert!(content.contains("Standup"));
        assert!(content.contains("Hi there everyone"));
        assert!(content.contains("Hello world"));
    }

    #[test]
    fn test_finalize_empty_session_fails() {
        let dir = TempDir::new().unwrap();
        let (_, archive) = archive_in(&dir);
        let err = archive.finalize_current().unwrap_err();
        assert!(err.to_string().contains("Empty transcript"));
    }

    #[test]
    fn test_recover_archives_unfinalized_session() {
        let dir = TempDir::new().unwrap();
        let (store, archive) = archive_in(&dir);
        seed_session(&store, "Planning", "2026-08-29T11:00:00+00:00");

        match archive.recover_last().unwrap() {
            RecoverOutcome::Recovered(id) => assert!(id > 0),
            other => panic!("expected recovery, got {:?}", other),
        }

        // Second attempt sees the snapshot already archived
        assert_eq!(
            archive.recover_last().unwrap(),
            RecoverOutcome::NothingToRecover
        );
    }

    #[test]
    fn test_recover_with_empty_state_is_noop() {
        let dir = TempDir::new().unwrap();
        let (_, archive) = archive_in(&dir);
        assert_eq!(
            archive.recover_last().unwrap(),
            RecoverOutcome::NothingToRecover
        );
    }

    #[test]
    fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let (store, archive) = archive_in(&dir);

        for (title, start) in [
            ("First", "2026-08-29T09:00:00+00:00"),
            ("Second", "2026-08-29T10:00:00+00:00"),
        ] {
            seed_session(&store, title, start);
            archive.finalize_current().unwrap();
        }

        let meetings = store
            .with_conn(|conn| MeetingRepository::list(conn, 10))
            .unwrap();
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].title, "Second");
    }

    #[test]
    fn test_corrupt_row_lists_as_empty_meeting() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO meetings (title, meeting_start_timestamp, \
                     meeting_end_timestamp, transcript, chat_messages) \
                     VALUES ('Damaged', 't0', 't1', 'not json', '[')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let record = store
            .with_conn(|conn| MeetingRepository::newest(conn))
            .unwrap()
            .unwrap();
        assert_eq!(record.title, "Damaged");
        assert!(record.transcript.is_empty());
        assert!(record.chat_messages.is_empty());
    }

    #[test]
    fn test_duration_string() {
        assert_eq!(
            duration_string("2026-08-29T10:00:00+00:00", "2026-08-29T10:32:00+00:00"),
            "32m"
        );
        assert_eq!(
            duration_string("2026-08-29T10:00:00+00:00", "2026-08-29T11:05:00+00:00"),
            "1h 5m"
        );
        assert_eq!(duration_string("garbage", "alsogarbage"), "unknown");
    }
}
