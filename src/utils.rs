//! Utility functions

use crate::constants::APP_NAME;
use crate::server::ServerRecord;
use std::path::PathBuf;

/// Get the app data directory path
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Player column text, e.g. "12/64" or "12/64 (+2)" with spectators
pub fn format_players(server: &ServerRecord) -> String {
    if server.spectators > 0 {
        format!("{}/{} (+{})", server.players, server.max_players, server.spectators)
    } else {
        format!("{}/{}", server.players, server.max_players)
    }
}

/// Ping column text
pub fn format_ping(ping: u32) -> String {
    format!("{} ms", ping)
}

/// Pad or cut `text` to exactly `width` chars for table output
pub fn fit_column(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    } else {
        format!("{}{}", text, " ".repeat(width - count))
    }
}
