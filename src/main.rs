use anyhow::Result;
use clap::Parser;
use meetcap::{
    cli::{
        handle_analyze_command, handle_ask_command, handle_meetings_command,
        handle_recover_command, handle_replay_command, Cli, CliCommand,
    },
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        CliCommand::Version => {
            println!("meetcap {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Replay(args) => {
            let config = Config::load()?;
            handle_replay_command(args, &config).await
        }
        CliCommand::Meetings(args) => {
            let config = Config::load()?;
            handle_meetings_command(args, &config)
        }
        CliCommand::Recover => {
            let config = Config::load()?;
            handle_recover_command(&config)
        }
        CliCommand::Analyze(args) => {
            let config = Config::load()?;
            handle_analyze_command(args, &config).await
        }
        CliCommand::Ask(args) => {
            let config = Config::load()?;
            handle_ask_command(args, &config).await
        }
    }
}
