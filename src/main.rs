use anyhow::Result;
use clap::Parser;
use rollcall::{
    app,
    cli::{
        handle_classifier_command, handle_history_command, handle_logs_command, Cli, CliCommand,
    },
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("Rollcall {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Classifier(args)) => {
            handle_classifier_command(args).await?;
            return Ok(());
        }
        Some(CliCommand::History(args)) => {
            handle_history_command(args)?;
            return Ok(());
        }
        Some(CliCommand::Logs(args)) => {
            handle_logs_command(args)?;
            return Ok(());
        }
        None => {}
    }

    app::run_service().await
}
