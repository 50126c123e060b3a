//! Join compatibility between the local client and a server

use crate::constants::XPACK_MAP_PREFIX;
use crate::server::ServerRecord;
use crate::version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What the local client has installed and which builds it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientCapabilities {
    pub available_xpacks: BTreeSet<i64>,
    /// Oldest server build the client will talk to
    pub min_server_build: i64,
    /// The client's own build number
    pub build: i64,
    pub mod_runtime_version: String,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            available_xpacks: BTreeSet::new(),
            min_server_build: 0,
            build: 0,
            mod_runtime_version: "1.0.0".to_string(),
        }
    }
}

/// First rule a server fails, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incompatibility {
    MapNotInstalled,
    DlcNotInstalled,
    ServerBuildOutdated,
    ClientBuildOutdated,
    ModRuntimeMismatch,
}

impl Incompatibility {
    pub fn message(&self) -> &'static str {
        match self {
            Incompatibility::MapNotInstalled => {
                "This server is running a map you do not currently have installed."
            }
            Incompatibility::DlcNotInstalled => {
                "This server is using DLC content you do not currently have installed."
            }
            Incompatibility::ServerBuildOutdated => "This server is running an outdated build of VU.",
            Incompatibility::ClientBuildOutdated => {
                "This server is running a newer build of VU. You need to update your client to join."
            }
            Incompatibility::ModRuntimeMismatch => {
                "This server is running mods incompatible with your current build of VU. You may need to update."
            }
        }
    }
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of running the rule set against one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible(Incompatibility),
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }

    pub fn reason(&self) -> Option<Incompatibility> {
        match self {
            Compatibility::Compatible => None,
            Compatibility::Incompatible(reason) => Some(*reason),
        }
    }
}

/// Run the rules in order and stop at the first failure.
pub fn evaluate(server: &ServerRecord, caps: &ClientCapabilities) -> Compatibility {
    let rules: [(fn(&ServerRecord, &ClientCapabilities) -> bool, Incompatibility); 5] = [
        (is_map_available, Incompatibility::MapNotInstalled),
        (are_xpacks_available, Incompatibility::DlcNotInstalled),
        (is_server_build_acceptable, Incompatibility::ServerBuildOutdated),
        (is_client_build_sufficient, Incompatibility::ClientBuildOutdated),
        (is_mod_runtime_compatible, Incompatibility::ModRuntimeMismatch),
    ];

    for (passes, reason) in rules {
        if !passes(server, caps) {
            return Compatibility::Incompatible(reason);
        }
    }
    Compatibility::Compatible
}

/// Expansion maps (`Levels/XP<n>...`) need pack `n`. Unreadable pack numbers pass.
fn is_map_available(server: &ServerRecord, caps: &ClientCapabilities) -> bool {
    let Some(rest) = server.map.strip_prefix(XPACK_MAP_PREFIX) else {
        return true;
    };
    match rest.chars().next().and_then(|c| c.to_digit(10)) {
        Some(pack) => caps.available_xpacks.contains(&(pack as i64)),
        None => true,
    }
}

fn are_xpacks_available(server: &ServerRecord, caps: &ClientCapabilities) -> bool {
    server
        .xpacks
        .iter()
        .all(|pack| caps.available_xpacks.contains(pack))
}

fn is_server_build_acceptable(server: &ServerRecord, caps: &ClientCapabilities) -> bool {
    match server.build {
        Some(build) => build >= caps.min_server_build,
        None => true,
    }
}

fn is_client_build_sufficient(server: &ServerRecord, caps: &ClientCapabilities) -> bool {
    match server.min_build {
        Some(required) => caps.build >= required,
        None => true,
    }
}

fn is_mod_runtime_compatible(server: &ServerRecord, caps: &ClientCapabilities) -> bool {
    version::is_compatible(&caps.mod_runtime_version, &server.mod_runtime_req)
}
