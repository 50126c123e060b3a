//! Common types and data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column to sort the server list by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Map,
    Gamemode,
    Players,
    Ping,
}

/// Sort direction for the server list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Active sort column and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub sort_by: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            sort_by: SortColumn::Ping,
            direction: SortDirection::Ascending,
        }
    }
}

impl SortState {
    /// Header click: same column flips direction, a new column starts ascending.
    pub fn clicked(self, column: SortColumn) -> Self {
        if self.sort_by == column {
            Self { sort_by: column, direction: self.direction.flipped() }
        } else {
            Self { sort_by: column, direction: SortDirection::Ascending }
        }
    }
}

/// How the client enters a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMode {
    Join,
    Spectate,
}

impl fmt::Display for ConnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectMode::Join => f.write_str("join"),
            ConnectMode::Spectate => f.write_str("spectate"),
        }
    }
}

/// Server list fetch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
}
