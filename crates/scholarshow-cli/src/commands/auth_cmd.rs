use scholarshow_core::auth::{IdentityProvider, SignUpOutcome};
use scholarshow_core::session::IdentityTransition;

use crate::cli::AuthCommands;
use crate::commands::common::App;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, app: &App) -> Result<(), CliError> {
    let profile_name = &app.profile_name;
    match command {
        AuthCommands::Signup { email, password } => {
            let provider = app.require_remote()?;
            match provider.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(user) => {
                    println!("Signed up profile '{profile_name}' as {}", user.label());
                    report_transition(app.toolkit.controller().refresh_identity().await);
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Check {email} to confirm the account, then run `scholarshow auth login`.");
                }
            }
        }
        AuthCommands::Login { email, password } => {
            let provider = app.require_remote()?;
            let user = provider.sign_in(&email, &password).await?;
            println!("Signed in profile '{profile_name}' as {}", user.label());
            report_transition(app.toolkit.controller().refresh_identity().await);
        }
        AuthCommands::LoginIdToken { provider: issuer, token } => {
            let provider = app.require_remote()?;
            let user = provider.sign_in_with_id_token(&issuer, &token).await?;
            println!("Signed in profile '{profile_name}' as {}", user.label());
            report_transition(app.toolkit.controller().refresh_identity().await);
        }
        AuthCommands::Logout => {
            let provider = app.require_remote()?;
            provider.sign_out().await?;
            app.toolkit.controller().refresh_identity().await;
            println!("Signed out profile '{profile_name}'");
        }
        AuthCommands::Status => match app.toolkit.controller().identity() {
            Some(user) => println!("Profile '{profile_name}' is signed in as {}", user.label()),
            None if app.require_remote().is_err() => {
                println!("Profile '{profile_name}' has no cloud configuration (local only).");
            }
            None => println!("Profile '{profile_name}' is not signed in."),
        },
    }
    Ok(())
}

fn report_transition(transition: IdentityTransition) {
    match transition {
        IdentityTransition::SignedIn { applied: true } => println!("Loaded cloud state"),
        IdentityTransition::SignedIn { applied: false } => {
            println!("No cloud state yet; local data kept");
        }
        IdentityTransition::Unchanged
        | IdentityTransition::SignedOut
        | IdentityTransition::Superseded => {}
    }
}
