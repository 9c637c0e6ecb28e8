//! Study timer state

use serde::{Deserialize, Serialize};

/// Largest accepted minutes input.
pub const MAX_TIMER_MINUTES: u32 = 180;
/// Largest accepted seconds input.
pub const MAX_TIMER_SECONDS_INPUT: u32 = 3599;
/// Upper bound for any timer duration, in seconds.
pub const MAX_TIMER_SECONDS: u32 = MAX_TIMER_MINUTES * 60 + MAX_TIMER_SECONDS_INPUT;
/// Duration a fresh timer starts with (25:00).
pub const DEFAULT_TIMER_SECONDS: u32 = 25 * 60;

/// Countdown configuration and progress.
///
/// `remaining_seconds` never exceeds `default_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub default_seconds: u32,
    pub remaining_seconds: u32,
    pub running: bool,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            default_seconds: DEFAULT_TIMER_SECONDS,
            remaining_seconds: DEFAULT_TIMER_SECONDS,
            running: false,
        }
    }
}

impl TimerState {
    /// Build a stopped timer, clamping both values into their domains.
    #[must_use]
    pub fn stopped(default_seconds: u32, remaining_seconds: u32) -> Self {
        let default_seconds = default_seconds.clamp(1, MAX_TIMER_SECONDS);
        Self {
            default_seconds,
            remaining_seconds: remaining_seconds.min(default_seconds),
            running: false,
        }
    }

    /// Remaining time as `MM:SS`.
    #[must_use]
    pub fn display(&self) -> String {
        format_clock(self.remaining_seconds)
    }
}

/// Format seconds as `MM:SS` (minutes are not wrapped into hours).
#[must_use]
pub fn format_clock(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Validate an untrusted numeric value and clamp it into `[min, max]`.
///
/// Non-finite values are rejected; fractional values are floored.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_timer_seconds(value: f64, min: u32, max: u32) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let clamped = value.floor().clamp(f64::from(min), f64::from(max));
    Some(clamped as u32)
}
