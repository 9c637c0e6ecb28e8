pub mod auth_cmd;
pub mod calc;
pub mod canvas;
pub mod common;
pub mod completions;
pub mod config;
pub mod notes;
pub mod share;
pub mod sync;
pub mod timer;

use std::path::PathBuf;

use crate::cli::ToolkitCommands;
use crate::commands::common::open_app;
use crate::error::CliError;

/// Open the toolkit, run `command`, then drain background pushes.
pub async fn run_toolkit_command(
    command: ToolkitCommands,
    profile: Option<&str>,
    db_path: Option<PathBuf>,
) -> Result<(), CliError> {
    let app = open_app(profile, db_path).await?;

    let result = match command {
        ToolkitCommands::Notes { command } => notes::run_notes(command, &app).await,
        ToolkitCommands::Timer { command } => timer::run_timer(command, &app).await,
        ToolkitCommands::Canvas { command } => canvas::run_canvas(command, &app),
        ToolkitCommands::Share { target } => share::run_share(target.into(), &app).await,
        ToolkitCommands::Unshare { target } => share::run_unshare(target.into(), &app).await,
        ToolkitCommands::Open { link, output } => {
            share::run_open(&link, output.as_deref(), &app).await
        }
        ToolkitCommands::Sync { command } => sync::run_sync(command, &app).await,
        ToolkitCommands::Auth { command } => auth_cmd::run_auth(command, &app).await,
    };

    app.finish().await;
    result
}
