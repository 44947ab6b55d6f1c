use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetcap")]
#[command(about = "Meeting transcript and chat capture engine", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Replay a recorded page session through the capture engine
    Replay(ReplayCliArgs),
    /// Browse and export archived meetings
    Meetings(MeetingsCliArgs),
    /// Archive the last session if it never got finalized
    Recover,
    /// Summarize an archived meeting via the analysis backend
    Analyze(AnalyzeCliArgs),
    /// Ask a question about the most recently analyzed meeting
    Ask(AskCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct ReplayCliArgs {
    /// Path to the session script (JSON)
    pub script: PathBuf,
    /// Run against a throwaway in-memory store instead of the archive
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(ClapArgs, Debug)]
pub struct MeetingsCliArgs {
    #[command(subcommand)]
    pub command: MeetingsCommand,
}

#[derive(Subcommand, Debug)]
pub enum MeetingsCommand {
    /// List archived meetings, newest first
    List {
        /// Maximum number of meetings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print one archived meeting in full
    Show { id: i64 },
    /// Write one archived meeting as a plain-text file
    Export {
        id: i64,
        /// Output path (defaults to the configured export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
pub struct AnalyzeCliArgs {
    /// Meeting id to analyze (defaults to the newest)
    pub id: Option<i64>,
    /// Override the configured translation language
    #[arg(long)]
    pub language: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct AskCliArgs {
    /// Question about the most recently analyzed meeting
    pub question: String,
}
