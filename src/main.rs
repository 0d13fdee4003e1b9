//! Stroke Analysis - Main Entry Point

use clap::Parser;
use stroke_analysis::cli::{cmd_info, cmd_run, cmd_stats, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stroke_analysis=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(Commands::default_run) {
        Commands::Run { data, config, seed, output } => {
            cmd_run(&data, config.as_deref(), seed, output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Stats { data, config } => {
            cmd_stats(&data, config.as_deref())?;
        }
    }

    Ok(())
}
