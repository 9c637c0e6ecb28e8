use crate::cli::SyncCommands;
use crate::commands::common::App;
use crate::error::CliError;

pub async fn run_sync(command: Option<SyncCommands>, app: &App) -> Result<(), CliError> {
    app.require_remote()?;
    match command.unwrap_or(SyncCommands::Pull) {
        SyncCommands::Pull => {
            if app.toolkit.pull().await? {
                println!("Applied cloud state");
            } else {
                println!("No cloud state stored yet");
            }
        }
        SyncCommands::Push => {
            app.toolkit.push().await?;
            println!("Sync completed");
        }
    }
    Ok(())
}
