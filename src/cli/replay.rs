//! CLI handler for `meetcap replay`.
//!
//! Drives a recorded page script through the full engine in lockstep: each
//! script step is applied to the in-memory page and the events it produces
//! are handled to completion before the next step runs. That makes replays
//! deterministic and the archive output reproducible.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::archive::MeetingArchive;
use crate::capture::status::LogSurface;
use crate::capture::{SessionController, SessionOptions, SessionPhase};
use crate::cli::args::ReplayCliArgs;
use crate::config::Config;
use crate::page::scripted::{Script, ScriptDriver, ScriptedPage};
use crate::page::PageEvent;
use crate::store::bridge::{LogSink, SessionSink, StoreBridge};
use crate::store::sqlite::SqliteStore;
use crate::store::{KeyValueStore, MemoryStore};

pub async fn handle_replay_command(args: ReplayCliArgs, config: &Config) -> Result<()> {
    let script = Script::load(&args.script)?;
    let page = Arc::new(ScriptedPage::with_title(script.title.clone()));

    let (store, sink): (Arc<dyn KeyValueStore>, Arc<dyn SessionSink>) = if args.dry_run {
        (Arc::new(MemoryStore::new()), Arc::new(LogSink))
    } else {
        let store = Arc::new(SqliteStore::open_default()?);
        let archive = MeetingArchive::new(store.clone(), config.export.resolve_dir()?);
        archive.ensure_capture_status()?;
        (store, Arc::new(archive))
    };

    let bridge = StoreBridge::new(store, sink);
    let mut controller = SessionController::new(
        page.clone(),
        bridge,
        Arc::new(LogSurface),
        SessionOptions::from_config(&config.capture),
    );

    if !controller.begin().await {
        bail!("Capture is disabled by the stored status record");
    }

    let mut driver = ScriptDriver::new(&page);
    for step in &script.steps {
        for event in driver.apply(step)? {
            controller.handle_event(event).await;
        }
    }

    // A script that never clicks end-call still gets its final flush.
    if controller.phase() == SessionPhase::Active {
        controller.handle_event(PageEvent::EndCallClicked).await;
    }

    println!(
        "Replay finished: {} transcript block(s), {} chat message(s)",
        controller.transcript().len(),
        controller.chat_messages().len()
    );

    Ok(())
}
