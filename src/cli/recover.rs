//! CLI handler for `meetcap recover`.

use anyhow::Result;
use std::sync::Arc;

use crate::archive::{MeetingArchive, RecoverOutcome};
use crate::config::Config;
use crate::store::sqlite::SqliteStore;

pub fn handle_recover_command(config: &Config) -> Result<()> {
    let store = Arc::new(SqliteStore::open_default()?);
    let archive = MeetingArchive::new(store, config.export.resolve_dir()?);

    match archive.recover_last()? {
        RecoverOutcome::Recovered(id) => {
            println!("Recovered the last session as meeting #{}", id);
        }
        RecoverOutcome::NothingToRecover => {
            println!("Nothing to recover: the last session is empty or already archived.");
        }
    }
    Ok(())
}
