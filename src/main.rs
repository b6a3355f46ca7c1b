use anyhow::Result;
use clap::Parser;
use meeting_summary::{
    app,
    cli::{handle_config_command, Cli, CliCommand},
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if cli.command == Some(CliCommand::Version) {
        println!("meeting-summary {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Some(CliCommand::Config) => handle_config_command(&config),
        Some(CliCommand::Serve) | Some(CliCommand::Version) | None => {
            app::run_service(config).await
        }
    }
}
