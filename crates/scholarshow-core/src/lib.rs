//! scholarshow-core - Core library for ScholarShow
//!
//! This crate contains the models, local snapshot store, cloud sync and
//! share-link logic used by ScholarShow front ends (currently the CLI).

pub mod auth;
pub mod calculator;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod share;
pub mod snapshot;
pub mod storage;
pub mod sync;
pub mod timer;
pub mod toolkit;
mod util;

pub use error::{Error, Result};
pub use models::{AppState, ShareId, ShareKind};
pub use toolkit::{ActiveShare, Toolkit};
