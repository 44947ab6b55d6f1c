//! CLI handlers for browsing and exporting archived meetings.

use anyhow::{bail, Context, Result};

use crate::archive::{duration_string, format_meeting_text, MeetingRecord, MeetingRepository};
use crate::cli::args::{MeetingsCliArgs, MeetingsCommand};
use crate::config::Config;
use crate::store::sqlite::SqliteStore;

pub fn handle_meetings_command(args: MeetingsCliArgs, config: &Config) -> Result<()> {
    let store = SqliteStore::open_default()?;

    match args.command {
        MeetingsCommand::List { limit } => {
            let meetings = store.with_conn(|conn| MeetingRepository::list(conn, limit))?;
            if meetings.is_empty() {
                println!("No meetings archived yet.");
                return Ok(());
            }
            for meeting in meetings {
                println!(
                    "#{} {} [{}] {} - {} message(s)",
                    meeting.id,
                    meeting.title,
                    duration_string(
                        &meeting.meeting_start_timestamp,
                        &meeting.meeting_end_timestamp
                    ),
                    meeting.meeting_start_timestamp,
                    meeting.chat_messages.len(),
                );
            }
            Ok(())
        }
        MeetingsCommand::Show { id } => {
            let meeting = fetch(&store, id)?;
            print!("{}", render(&meeting));
            Ok(())
        }
        MeetingsCommand::Export { id, output } => {
            let meeting = fetch(&store, id)?;
            let path = match output {
                Some(path) => path,
                None => {
                    let dir = config.export.resolve_dir()?;
                    std::fs::create_dir_all(&dir)
                        .context("Failed to create export directory")?;
                    dir.join(format!("meeting-{}.txt", id))
                }
            };
            std::fs::write(&path, render(&meeting)).context("Failed to write export file")?;
            println!("Exported meeting #{} to {}", id, path.display());
            Ok(())
        }
    }
}

fn fetch(store: &SqliteStore, id: i64) -> Result<MeetingRecord> {
    match store.with_conn(|conn| MeetingRepository::get(conn, id))? {
        Some(meeting) => Ok(meeting),
        None => bail!("Meeting #{} not found", id),
    }
}

fn render(meeting: &MeetingRecord) -> String {
    format_meeting_text(
        &meeting.title,
        &meeting.meeting_start_timestamp,
        &meeting.meeting_end_timestamp,
        &meeting.transcript,
        &meeting.chat_messages,
    )
}
