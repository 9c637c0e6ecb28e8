//! ScholarShow CLI - notes, study timer, canvas and calculator from the terminal
//!
//! Works fully offline; with a Supabase profile it syncs state and shares
//! notes and canvases as links.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::calc::run_calc;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::run_toolkit_command;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "scholarshow=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Toolkit(command)) => {
            run_toolkit_command(command, cli.profile.as_deref(), cli.db_path).await?;
        }
        Some(Commands::Calc { keys }) => run_calc(&keys)?,
        Some(Commands::Config { command }) => run_config(command, cli.profile.as_deref())?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
