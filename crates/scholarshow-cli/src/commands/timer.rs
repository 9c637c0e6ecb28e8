use scholarshow_core::models::{format_clock, TimerState};

use crate::cli::TimerCommands;
use crate::commands::common::App;
use crate::error::CliError;

pub async fn run_timer(command: Option<TimerCommands>, app: &App) -> Result<(), CliError> {
    match command.unwrap_or(TimerCommands::Show) {
        TimerCommands::Show => println!("{}", describe_timer(&app.toolkit.timer())),
        TimerCommands::Set { minutes, seconds } => {
            let timer = app.toolkit.apply_timer_inputs(&minutes, &seconds)?;
            println!("Timer set to {}", timer.display());
        }
        TimerCommands::Start => run_countdown(app).await?,
        TimerCommands::Pause => {
            let timer = app.toolkit.pause_timer()?;
            println!("{}", describe_timer(&timer));
        }
        TimerCommands::Reset => {
            let timer = app.toolkit.reset_timer()?;
            println!("{}", describe_timer(&timer));
        }
    }
    Ok(())
}

/// Count down in the foreground until done or interrupted.
async fn run_countdown(app: &App) -> Result<(), CliError> {
    let countdown = app.toolkit.controller().countdown();
    let mut updates = countdown.subscribe();
    if !app.toolkit.start_timer() {
        println!("Timer is already running");
        return Ok(());
    }

    loop {
        let state = *updates.borrow_and_update();
        println!("{}", state.display());
        if !state.running {
            break;
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                let timer = app.toolkit.pause_timer()?;
                println!("Paused at {}", timer.display());
                return Ok(());
            }
        }
    }

    let timer = app.toolkit.record_timer()?;
    if timer.remaining_seconds == 0 {
        println!("Time's up!");
    }
    Ok(())
}

pub fn describe_timer(timer: &TimerState) -> String {
    let status = if timer.running { "running" } else { "stopped" };
    format!(
        "{} of {} ({status})",
        timer.display(),
        format_clock(timer.default_seconds)
    )
}
