//! Study countdown timer.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use regex::Regex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{
    clamp_timer_seconds, TimerState, MAX_TIMER_MINUTES, MAX_TIMER_SECONDS_INPUT,
};

const TICK: Duration = Duration::from_secs(1);

/// Countdown with at most one tick task at any time.
pub struct Countdown {
    state: Arc<watch::Sender<TimerState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    #[must_use]
    pub fn new(initial: TimerState) -> Self {
        let initial = TimerState::stopped(initial.default_seconds, initial.remaining_seconds);
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            ticker: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> TimerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.subscribe()
    }

    /// Remaining time as `MM:SS`.
    pub fn display(&self) -> String {
        self.snapshot().display()
    }

    /// Configure the duration from free-form minute and second inputs.
    ///
    /// Inputs are read leniently (a leading number, else 0) and clamped to
    /// their ranges. A total of zero is rejected. Stops the countdown.
    pub fn apply_from_inputs(&self, minutes: &str, seconds: &str) -> Result<TimerState> {
        let minutes = parse_input(minutes, MAX_TIMER_MINUTES);
        let seconds = parse_input(seconds, MAX_TIMER_SECONDS_INPUT);
        let total = minutes * 60 + seconds;
        if total == 0 {
            return Err(Error::Invalid("Please set a time greater than 0.".to_string()));
        }

        self.stop_ticker();
        let state = TimerState::stopped(total, total);
        self.state.send_replace(state);
        Ok(state)
    }

    /// Start counting down. Returns `false` when already running.
    ///
    /// A finished countdown restarts from its configured duration.
    pub fn start(&self) -> bool {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        self.state.send_modify(|state| {
            if state.remaining_seconds == 0 {
                state.remaining_seconds = state.default_seconds;
            }
            state.running = true;
        });

        let state = Arc::clone(&self.state);
        *ticker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(TICK).await;
                let mut finished = false;
                state.send_modify(|state| {
                    state.remaining_seconds = state.remaining_seconds.saturating_sub(1);
                    if state.remaining_seconds == 0 {
                        state.running = false;
                        finished = true;
                    }
                });
                if finished {
                    tracing::info!("Countdown finished");
                    break;
                }
            }
        }));
        true
    }

    /// Stop counting down, keeping the remaining time.
    pub fn pause(&self) {
        self.stop_ticker();
        self.state.send_modify(|state| state.running = false);
    }

    /// Stop and restore the configured duration.
    pub fn reset(&self) {
        self.stop_ticker();
        self.state.send_modify(|state| {
            state.running = false;
            state.remaining_seconds = state.default_seconds;
        });
    }

    /// Replace the whole state (e.g. after applying cloud values). Stops.
    pub fn load(&self, default_seconds: u32, remaining_seconds: u32) {
        self.stop_ticker();
        self.state
            .send_replace(TimerState::stopped(default_seconds, remaining_seconds));
    }

    /// Wait until the countdown is no longer running.
    pub async fn wait_stopped(&self) -> TimerState {
        let mut receiver = self.subscribe();
        let state = receiver.wait_for(|state| !state.running).await.map(|state| *state);
        state.unwrap_or_else(|_| self.snapshot())
    }

    fn stop_ticker(&self) {
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = ticker {
            handle.abort();
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

/// Leading number of `text`, floored and clamped into `[0, max]`.
fn parse_input(text: &str, max: u32) -> u32 {
    static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();
    let pattern = LEADING_NUMBER
        .get_or_init(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)").expect("Invalid regex"));

    pattern
        .find(text.trim())
        .and_then(|found| found.as_str().parse::<f64>().ok())
        .and_then(|value| clamp_timer_seconds(value, 0, max))
        .unwrap_or(0)
}
