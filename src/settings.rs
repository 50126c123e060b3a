//! User settings stored as settings.json in the app data directory

use crate::app::FilterSpec;
use crate::compat::ClientCapabilities;
use crate::types::SortState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // List
    pub sort: SortState,
    pub filters: FilterSpec,

    // View
    pub compact_view: bool,

    /// Replaces what the host reports, for testing against other builds
    pub capabilities: Option<ClientCapabilities>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sort: SortState::default(),
            filters: FilterSpec::default(),
            compact_view: false,
            capabilities: None,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str(&s) {
                Ok(settings) => {
                    debug!(path = %path.display(), "Settings loaded");
                    settings
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse settings, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                debug!("No settings file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) {
        let path = data_dir.join("settings.json");
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, "Failed to save settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }
}
