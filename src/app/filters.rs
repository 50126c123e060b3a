//! Filtering, sorting and row annotation for the server list

use crate::compat::{self, ClientCapabilities};
use crate::display;
use crate::favorites::FavoritesSet;
use crate::performance;
use crate::server::ServerRecord;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Filter options. `None` fields impose no constraint.
///
/// Compared structurally against `FilterSpec::default()` to decide whether
/// the "filter applied" indicator shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Exact raw map identifier
    pub map: Option<String>,
    /// Exact raw gamemode identifier
    pub gamemode: Option<String>,
    pub min_players: Option<u32>,
    pub max_players: Option<u32>,
    pub max_ping: Option<u32>,
    pub show_passworded: bool,
    pub favorites_only: bool,
    /// Case-insensitive substring of the server name
    pub name_query: Option<String>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            map: None,
            gamemode: None,
            min_players: None,
            max_players: None,
            max_ping: None,
            show_passworded: true,
            favorites_only: false,
            name_query: None,
        }
    }
}

impl FilterSpec {
    pub fn is_applied(&self) -> bool {
        *self != Self::default()
    }

    pub fn matches(&self, server: &ServerRecord, favorites: &FavoritesSet) -> bool {
        if let Some(map) = &self.map {
            if server.map != *map {
                return false;
            }
        }
        if let Some(gamemode) = &self.gamemode {
            if server.gamemode != *gamemode {
                return false;
            }
        }
        if let Some(min) = self.min_players {
            if server.players < min {
                return false;
            }
        }
        if let Some(max) = self.max_players {
            if server.players > max {
                return false;
            }
        }
        if let Some(max_ping) = self.max_ping {
            if server.ping > max_ping {
                return false;
            }
        }
        if !self.show_passworded && server.passworded {
            return false;
        }
        if self.favorites_only && !favorites.contains(&server.guid) {
            return false;
        }
        if let Some(query) = &self.name_query {
            let query = query.trim().to_lowercase();
            if !query.is_empty() && !server.name.to_lowercase().contains(&query) {
                return false;
            }
        }
        true
    }
}

/// One rendered row of the browser
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRow {
    pub server: ServerRecord,
    pub is_favorite: bool,
    pub display_name: String,
    pub map_name: String,
    pub gamemode_name: String,
}

impl ServerRow {
    fn annotate(server: &ServerRecord, favorites: &FavoritesSet) -> Self {
        Self {
            is_favorite: favorites.contains(&server.guid),
            display_name: server.display_name(),
            map_name: display::map_name(&server.map),
            gamemode_name: display::gamemode_name(&server.gamemode),
            server: server.clone(),
        }
    }

    /// Inline notice under the row: the compatibility reason if there is
    /// one, otherwise the lag warning.
    pub fn notice(&self, caps: &ClientCapabilities) -> Option<String> {
        if let Some(reason) = compat::evaluate(&self.server, caps).reason() {
            return Some(reason.to_string());
        }
        performance::advise(&self.server).message.map(str::to_string)
    }

    /// Image shown behind the row: the server banner, else the bundled map shot
    pub fn background(&self) -> Option<String> {
        if let Some(banner) = &self.server.banner {
            return Some(banner.clone());
        }
        if display::has_map_image(&self.server.map) {
            return Some(format!(
                "/assets/img/maps/{}.png",
                display::level_name(&self.server.map)
            ));
        }
        None
    }
}

/// Filter, sort and annotate a raw server list for display.
///
/// Sorting is stable in both directions: equal keys keep their order from `servers`.
pub fn derive(
    servers: &[ServerRecord],
    filter: &FilterSpec,
    sort: SortState,
    favorites: &FavoritesSet,
) -> Vec<ServerRow> {
    let mut rows: Vec<ServerRow> = servers
        .iter()
        .filter(|s| filter.matches(s, favorites))
        .map(|s| ServerRow::annotate(s, favorites))
        .collect();

    rows.sort_by(|a, b| {
        let cmp = compare_rows(a, b, sort.sort_by);
        if sort.direction == SortDirection::Descending {
            cmp.reverse()
        } else {
            cmp
        }
    });

    rows
}

fn compare_rows(a: &ServerRow, b: &ServerRow, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Map => a.map_name.to_lowercase().cmp(&b.map_name.to_lowercase()),
        SortColumn::Gamemode => a
            .gamemode_name
            .to_lowercase()
            .cmp(&b.gamemode_name.to_lowercase()),
        SortColumn::Players => a.server.players.cmp(&b.server.players),
        SortColumn::Ping => a.server.ping.cmp(&b.server.ping),
    }
}

/// Header text for the list
pub fn server_count_text(count: usize, status: FetchStatus) -> String {
    if status == FetchStatus::Fetching {
        return "Fetching Servers".to_string();
    }
    format!("Found {} server{}", count, if count != 1 { "s" } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::RawServerRecord;
    use serde_json::json;

    fn server(guid: &str, map: &str, gamemode: &str, players: u32, ping: u32) -> ServerRecord {
        let raw: RawServerRecord = serde_json::from_value(json!({
            "guid": guid,
            "name": format!("Server {guid}"),
            "ping": ping,
            "players": players,
            "variables": { "mapname": map, "gamemode": gamemode },
        }))
        .unwrap();
        ServerRecord::from_raw(raw)
    }

    fn sample() -> Vec<ServerRecord> {
        vec![
            server("a", "Levels/MP_Subway/MP_Subway", "RushLarge0", 10, 80),
            server("b", "Levels/MP_001/MP_001", "ConquestLarge0", 30, 20),
            server("c", "Levels/XP1_004/XP1_004", "RushLarge0", 10, 50),
            server("d", "Levels/MP_001/MP_001", "SquadRush0", 0, 20),
        ]
    }

    fn guids(rows: &[ServerRow]) -> Vec<&str> {
        rows.iter().map(|r| r.server.guid.as_str()).collect()
    }

    fn sort(sort_by: SortColumn, direction: SortDirection) -> SortState {
        SortState { sort_by, direction }
    }

    #[test]
    fn sorts_numeric_columns_numerically() {
        let rows = derive(
            &sample(),
            &FilterSpec::default(),
            sort(SortColumn::Ping, SortDirection::Ascending),
            &FavoritesSet::new(),
        );
        assert_eq!(guids(&rows), vec!["b", "d", "c", "a"]);

        let rows = derive(
            &sample(),
            &FilterSpec::default(),
            sort(SortColumn::Players, SortDirection::Descending),
            &FavoritesSet::new(),
        );
        assert_eq!(guids(&rows), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn sorts_map_by_display_name() {
        let rows = derive(
            &sample(),
            &FilterSpec::default(),
            sort(SortColumn::Map, SortDirection::Ascending),
            &FavoritesSet::new(),
        );
        // Grand Bazaar, Grand Bazaar, Operation Metro, Wake Island
        assert_eq!(guids(&rows), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn ties_keep_input_order_in_both_directions() {
        let asc = derive(
            &sample(),
            &FilterSpec::default(),
            sort(SortColumn::Gamemode, SortDirection::Ascending),
            &FavoritesSet::new(),
        );
        // Conquest Large, Rush, Rush, Squad Rush
        assert_eq!(guids(&asc), vec!["b", "a", "c", "d"]);

        let desc = derive(
            &sample(),
            &FilterSpec::default(),
            sort(SortColumn::Gamemode, SortDirection::Descending),
            &FavoritesSet::new(),
        );
        assert_eq!(guids(&desc), vec!["d", "a", "c", "b"]);
    }

    #[test]
    fn resorting_sorted_output_is_identical() {
        let state = sort(SortColumn::Players, SortDirection::Ascending);
        let once = derive(&sample(), &FilterSpec::default(), state, &FavoritesSet::new());
        let sorted: Vec<ServerRecord> = once.iter().map(|r| r.server.clone()).collect();
        let twice = derive(&sorted, &FilterSpec::default(), state, &FavoritesSet::new());
        assert_eq!(guids(&once), guids(&twice));
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = FilterSpec { max_ping: Some(60), ..Default::default() };
        let state = SortState::default();
        let once = derive(&sample(), &filter, state, &FavoritesSet::new());
        let kept: Vec<ServerRecord> = once.iter().map(|r| r.server.clone()).collect();
        let twice = derive(&kept, &filter, state, &FavoritesSet::new());
        assert_eq!(guids(&once), vec!["b", "d", "c"]);
        assert_eq!(guids(&once), guids(&twice));
    }

    #[test]
    fn rows_are_annotated() {
        let favorites: FavoritesSet = vec!["c".to_string()].into_iter().collect();
        let rows = derive(&sample(), &FilterSpec::default(), SortState::default(), &favorites);
        let c = rows.iter().find(|r| r.server.guid == "c").unwrap();
        assert!(c.is_favorite);
        assert_eq!(c.map_name, "Wake Island");
        assert_eq!(c.gamemode_name, "Rush");
        assert_eq!(c.background().as_deref(), Some("/assets/img/maps/XP1_004.png"));
        assert!(!rows.iter().find(|r| r.server.guid == "a").unwrap().is_favorite);
    }

    #[test]
    fn notice_prefers_compatibility_reason() {
        let raw: RawServerRecord = serde_json::from_value(json!({
            "guid": "x",
            "variables": { "mapname": "Levels/XP2_Office/XP2_Office", "fps": "10" },
        }))
        .unwrap();
        let rows = derive(
            &[ServerRecord::from_raw(raw)],
            &FilterSpec::default(),
            SortState::default(),
            &FavoritesSet::new(),
        );
        let no_packs = ClientCapabilities::default();
        assert_eq!(
            rows[0].notice(&no_packs).as_deref(),
            Some("This server is running a map you do not currently have installed.")
        );

        let with_pack = ClientCapabilities {
            available_xpacks: [2].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(
            rows[0].notice(&with_pack).as_deref(),
            Some("This server has low fps. You might experience lag.")
        );
    }

    #[test]
    fn count_text() {
        assert_eq!(server_count_text(1, FetchStatus::Idle), "Found 1 server");
        assert_eq!(server_count_text(3, FetchStatus::Idle), "Found 3 servers");
        assert_eq!(server_count_text(3, FetchStatus::Fetching), "Fetching Servers");
    }

    #[test]
    fn default_filter_matches_everything() {
        let spec = FilterSpec::default();
        assert!(!spec.is_applied());
        assert_eq!(
            derive(&sample(), &spec, SortState::default(), &FavoritesSet::new()).len(),
            4
        );
    }

    #[test]
    fn any_change_marks_filter_applied() {
        assert!(FilterSpec { max_ping: Some(100), ..Default::default() }.is_applied());
        assert!(FilterSpec { show_passworded: false, ..Default::default() }.is_applied());
    }

    #[test]
    fn player_and_ping_bounds() {
        let spec = FilterSpec {
            min_players: Some(5),
            max_players: Some(20),
            max_ping: Some(60),
            ..Default::default()
        };
        let rows = derive(&sample(), &spec, SortState::default(), &FavoritesSet::new());
        assert_eq!(guids(&rows), vec!["c"]);
    }

    #[test]
    fn map_and_gamemode_are_exact() {
        let spec = FilterSpec { map: Some("Levels/MP_001/MP_001".into()), ..Default::default() };
        let rows = derive(&sample(), &spec, SortState::default(), &FavoritesSet::new());
        assert_eq!(guids(&rows), vec!["b", "d"]);

        let spec = FilterSpec { gamemode: Some("Rush".into()), ..Default::default() };
        assert!(derive(&sample(), &spec, SortState::default(), &FavoritesSet::new()).is_empty());
    }

    #[test]
    fn passworded_and_favorites_only() {
        let mut locked = sample();
        locked[0].passworded = true;
        let spec = FilterSpec { show_passworded: false, ..Default::default() };
        let rows = derive(&locked, &spec, SortState::default(), &FavoritesSet::new());
        assert!(!guids(&rows).contains(&"a"));

        let favorites: FavoritesSet = vec!["d".to_string()].into_iter().collect();
        let spec = FilterSpec { favorites_only: true, ..Default::default() };
        let rows = derive(&sample(), &spec, SortState::default(), &favorites);
        assert_eq!(guids(&rows), vec!["d"]);
    }

    #[test]
    fn name_query_is_case_insensitive() {
        let spec = FilterSpec { name_query: Some("SERVER C".into()), ..Default::default() };
        let rows = derive(&sample(), &spec, SortState::default(), &FavoritesSet::new());
        assert_eq!(guids(&rows), vec!["c"]);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let spec: FilterSpec = serde_json::from_str(r#"{"max_ping": 60}"#).unwrap();
        assert_eq!(spec.max_ping, Some(60));
        assert!(spec.show_passworded);
    }
}
