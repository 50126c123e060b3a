//! Error types

use std::fmt;
use std::io::Error as IoError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the I/O-bearing surfaces. Nothing in the decision core
/// returns these; rule failures and declined gates are plain values.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Connect failed: {0}")]
    Connect(ConnectFailure),

    #[error("Backend unavailable: {0}")]
    Backend(String),
}

/// Backend-reported reason a connect attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    Code(i64),
    Reason(String),
}

impl ConnectFailure {
    /// Human-readable message for the failure popup
    pub fn message(&self) -> String {
        match self {
            ConnectFailure::Code(0) => "Connection timed out.".to_string(),
            ConnectFailure::Code(4) => "No servers available.".to_string(),
            ConnectFailure::Code(23) => "Servers are busy. Keep retrying.".to_string(),
            ConnectFailure::Code(code) => format!("Unknown ({code})"),
            ConnectFailure::Reason(reason) => reason.clone(),
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
