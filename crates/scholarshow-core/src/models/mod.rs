//! Data models for ScholarShow

mod app_state;
mod attachment;
mod canvas;
mod share;
mod timer;

pub use app_state::{AppState, RemoteAppState};
pub use attachment::Attachment;
pub use canvas::CanvasImage;
pub use share::{NoteContent, ShareContent, ShareId, ShareItem, ShareKind};
pub use timer::{
    clamp_timer_seconds, format_clock, TimerState, DEFAULT_TIMER_SECONDS, MAX_TIMER_MINUTES,
    MAX_TIMER_SECONDS, MAX_TIMER_SECONDS_INPUT,
};
