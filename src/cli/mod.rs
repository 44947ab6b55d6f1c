pub mod args;

mod analyze;
mod meetings;
mod recover;
mod replay;

pub use analyze::{handle_analyze_command, handle_ask_command};
pub use args::{Cli, CliCommand};
pub use meetings::handle_meetings_command;
pub use recover::handle_recover_command;
pub use replay::handle_replay_command;
