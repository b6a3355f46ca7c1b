use crate::config::Config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meeting-summary")]
#[command(about = "Meeting audio to transcript and summary service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum CliCommand {
    /// Run the HTTP service (default)
    Serve,
    /// Print version information
    Version,
    /// Print the effective configuration
    Config,
}

pub fn handle_config_command(config: &Config) -> Result<()> {
    println!("{}", config.to_display_toml()?);
    Ok(())
}
