//! VU Server Browser - server list, compatibility checks and join gating
//!
//! The store (`app::ServerBrowser`) is synchronous and side-effect free apart
//! from favorites persistence. `app::Session` drives it on a tokio task
//! against a `backend::Backend`.

pub mod app;
pub mod backend;
pub mod compat;
pub mod constants;
pub mod db;
pub mod display;
pub mod error;
pub mod favorites;
pub mod performance;
pub mod server;
pub mod settings;
pub mod types;
pub mod utils;
pub mod version;

pub use error::{ConnectFailure, Error, Result};
