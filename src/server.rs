//! Server records as delivered by the backend, decoded once into a typed view

use crate::constants::NAME_DISPLAY_LIMIT;
use crate::error::Result;
use crate::version::leading_int;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Server record exactly as the backend sends it. `variables` is an open
/// string-keyed bag where numbers may arrive as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawServerRecord {
    pub guid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ping: Value,
    #[serde(default)]
    pub passworded: bool,
    #[serde(default)]
    pub players: Value,
    #[serde(default)]
    pub spectators: Value,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

/// Advertised tick rate class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Frequency {
    /// Unset, "reg", or anything unrecognized
    #[default]
    Regular,
    High60,
    High120,
}

impl Frequency {
    pub fn from_variable(value: Option<&str>) -> Self {
        match value {
            Some("high60") => Frequency::High60,
            Some("high120") => Frequency::High120,
            _ => Frequency::Regular,
        }
    }

    /// Row badge text, regular servers get none
    pub fn badge(&self) -> Option<&'static str> {
        match self {
            Frequency::High60 => Some("60Hz"),
            Frequency::High120 => Some("120Hz"),
            Frequency::Regular => None,
        }
    }
}

/// Typed, validated view of a server. Immutable for one refresh cycle.
///
/// Numeric fields that fail to parse become `None` (or zero for counts)
/// rather than errors; the compatibility rules treat `None` as "passes".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub guid: String,
    pub name: String,
    pub ping: u32,
    pub passworded: bool,
    pub players: u32,
    pub spectators: u32,
    pub map: String,
    pub gamemode: String,
    pub max_players: u32,
    pub max_spectators: u32,
    pub build: Option<i64>,
    pub min_build: Option<i64>,
    pub mod_runtime_req: String,
    pub frequency: Frequency,
    pub fps: Option<i64>,
    pub xpacks: Vec<i64>,
    pub tags: Vec<String>,
    pub banner: Option<String>,
}

impl ServerRecord {
    pub fn from_raw(raw: RawServerRecord) -> Self {
        let vars = &raw.variables;
        let text = |key: &str| var_text(vars, key);
        let int = |key: &str| vars.get(key).and_then(value_int);

        Self {
            guid: raw.guid,
            name: raw.name,
            ping: value_int(&raw.ping).map(clamp_u32).unwrap_or(0),
            passworded: raw.passworded,
            players: value_int(&raw.players).map(clamp_u32).unwrap_or(0),
            spectators: value_int(&raw.spectators).map(clamp_u32).unwrap_or(0),
            map: text("mapname").unwrap_or_default(),
            gamemode: text("gamemode").unwrap_or_default(),
            max_players: int("maxplayers").map(clamp_u32).unwrap_or(0),
            max_spectators: int("maxspectators").map(clamp_u32).unwrap_or(0),
            build: int("buildno"),
            min_build: int("min_buildno"),
            mod_runtime_req: text("vext_req").unwrap_or_default(),
            frequency: Frequency::from_variable(text("frequency").as_deref()),
            fps: int("fps"),
            xpacks: text("xpacks").map(|s| parse_xpacks(&s)).unwrap_or_default(),
            tags: text("tags").map(|s| parse_tags(&s)).unwrap_or_default(),
            banner: text("banner").filter(|b| is_valid_banner(b)),
        }
    }

    /// Name as shown in the row header
    pub fn display_name(&self) -> String {
        truncate_name(&self.name)
    }

    /// Spectating is only offered when the server has spectator slots
    pub fn can_spectate(&self) -> bool {
        self.max_spectators > 0
    }
}

/// Decode a JSON server list. Entries that are not objects or lack a guid
/// are dropped with a warning; everything else degrades field by field.
pub fn decode_server_list(json: &str) -> Result<Vec<ServerRecord>> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    let total = entries.len();

    let records: Vec<ServerRecord> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawServerRecord>(entry) {
            Ok(raw) if !raw.guid.is_empty() => Some(ServerRecord::from_raw(raw)),
            Ok(_) => {
                warn!("Dropping server record without guid");
                None
            }
            Err(e) => {
                warn!(error = %e, "Dropping undecodable server record");
                None
            }
        })
        .collect();

    debug!(decoded = records.len(), total, "Server list decoded");
    Ok(records)
}

/// Comma-separated pack indices; entries that are not numbers are skipped.
pub fn parse_xpacks(value: &str) -> Vec<i64> {
    if value.is_empty() {
        return Vec::new();
    }
    value.split(',').filter_map(leading_int).collect()
}

/// Comma-separated tags, de-duplicated, keeping only `[a-z0-9-]+` entries.
pub fn parse_tags(value: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in value.split(',') {
        if !is_valid_tag(tag) || tags.iter().any(|t| t == tag) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_banner(url: &str) -> bool {
    (url.starts_with("http://") || url.starts_with("https://")) && url.ends_with(".jpg")
}

/// Cut long names at the display limit and mark the cut with "..".
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_DISPLAY_LIMIT {
        let cut: String = name.chars().take(NAME_DISPLAY_LIMIT).collect();
        format!("{cut}..")
    } else {
        name.to_string()
    }
}

fn var_text(vars: &HashMap<String, Value>, key: &str) -> Option<String> {
    match vars.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => leading_int(s),
        _ => None,
    }
}

fn clamp_u32(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
