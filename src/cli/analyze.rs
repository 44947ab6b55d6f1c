//! CLI handlers for the analysis backend commands.

use anyhow::{bail, Result};

use crate::analysis::AnalysisClient;
use crate::archive::{format_meeting_text, MeetingRepository};
use crate::cli::args::{AnalyzeCliArgs, AskCliArgs};
use crate::config::Config;
use crate::store::sqlite::SqliteStore;

pub async fn handle_analyze_command(args: AnalyzeCliArgs, config: &Config) -> Result<()> {
    let store = SqliteStore::open_default()?;
    let meeting = match args.id {
        Some(id) => store.with_conn(|conn| MeetingRepository::get(conn, id))?,
        None => store.with_conn(MeetingRepository::newest)?,
    };
    let Some(meeting) = meeting else {
        bail!("No archived meeting to analyze");
    };

    let text = format_meeting_text(
        &meeting.title,
        &meeting.meeting_start_timestamp,
        &meeting.meeting_end_timestamp,
        &meeting.transcript,
        &meeting.chat_messages,
    );
    let language = args
        .language
        .as_deref()
        .or(config.analysis.language.as_deref());

    let client = AnalysisClient::new(&config.analysis.endpoint);
    let result = client
        .process_meeting(&text, &meeting.title, language)
        .await?;

    println!("Meeting #{}: {}\n", meeting.id, meeting.title);
    println!("{}", result.summary);
    if let Some(translated) = result.translated_summary {
        println!("\n--- Translated ---\n{}", translated);
    }
    Ok(())
}

pub async fn handle_ask_command(args: AskCliArgs, config: &Config) -> Result<()> {
    let client = AnalysisClient::new(&config.analysis.endpoint);
    let answer = client.ask(&args.question).await?;
    println!("{}", answer);
    Ok(())
}
