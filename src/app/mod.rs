//! App module - contains the browser state store and its transitions
//!
//! Every mutation goes through `ServerBrowser`, which the session drives
//! from a single task, so there is never more than one connection attempt.

mod clicks;
mod connection;
mod filters;
mod session;

pub use clicks::{ClickEvent, ClickTracker};
pub use connection::{
    AttemptStatus, ConnectionAttempt, ConnectionGate, GateOutcome, GateState,
};
pub use filters::{derive, server_count_text, FilterSpec, ServerRow};
pub use session::{Session, SessionHandle, Snapshot, UiEvent};

use crate::compat::ClientCapabilities;
use crate::error::ConnectFailure;
use crate::favorites::{FavoritesSet, FavoritesStore};
use crate::server::ServerRecord;
use crate::settings::Settings;
use crate::types::*;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// BROWSER STATE
// ============================================================================

pub struct ServerBrowser {
    servers: Vec<ServerRecord>,
    filters: FilterSpec,
    sort: SortState,
    favorites: FavoritesSet,
    favorites_store: Box<dyn FavoritesStore>,
    capabilities: ClientCapabilities,
    /// Set when settings override what the host reports
    capabilities_pinned: bool,
    clicks: ClickTracker,
    gate: ConnectionGate,
    fetch_status: FetchStatus,
    refresh_generation: u64,
    compact_view: bool,
}

impl ServerBrowser {
    pub fn new(
        capabilities: ClientCapabilities,
        settings: &Settings,
        favorites_store: Box<dyn FavoritesStore>,
    ) -> Self {
        let favorites = favorites_store.load_favorites().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load favorites, starting empty");
            FavoritesSet::new()
        });

        Self {
            servers: Vec::new(),
            filters: settings.filters.clone(),
            sort: settings.sort,
            favorites,
            favorites_store,
            capabilities: settings.capabilities.clone().unwrap_or(capabilities),
            capabilities_pinned: settings.capabilities.is_some(),
            clicks: ClickTracker::new(),
            gate: ConnectionGate::new(),
            fetch_status: FetchStatus::Idle,
            refresh_generation: 0,
            compact_view: settings.compact_view,
        }
    }

    /// Settings snapshot to persist
    pub fn settings(&self, previous: &Settings) -> Settings {
        Settings {
            sort: self.sort,
            filters: self.filters.clone(),
            compact_view: self.compact_view,
            capabilities: previous.capabilities.clone(),
        }
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    pub fn visible_servers(&self) -> Vec<ServerRow> {
        derive(&self.servers, &self.filters, self.sort, &self.favorites)
    }

    pub fn server(&self, guid: &str) -> Option<&ServerRecord> {
        self.servers.iter().find(|s| s.guid == guid)
    }

    pub fn servers(&self) -> &[ServerRecord] {
        &self.servers
    }

    pub fn filters(&self) -> &FilterSpec {
        &self.filters
    }

    pub fn has_filter_applied(&self) -> bool {
        self.filters.is_applied()
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn favorites(&self) -> &FavoritesSet {
        &self.favorites
    }

    pub fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.fetch_status
    }

    /// Bumped by every refresh request; zero until the first one
    pub fn refresh_generation(&self) -> u64 {
        self.refresh_generation
    }

    pub fn compact_view(&self) -> bool {
        self.compact_view
    }

    pub fn click_deadline(&self) -> Option<Instant> {
        self.clicks.deadline()
    }

    // ------------------------------------------------------------------------
    // List transitions
    // ------------------------------------------------------------------------

    pub fn on_sort_column(&mut self, column: SortColumn) {
        self.sort = self.sort.clicked(column);
        debug!(column = ?self.sort.sort_by, direction = ?self.sort.direction, "Sort changed");
    }

    pub fn on_set_filter(&mut self, filters: FilterSpec) {
        debug!(applied = filters.is_applied(), "Filters changed");
        self.filters = filters;
    }

    pub fn toggle_favorites_only(&mut self) {
        self.filters.favorites_only = !self.filters.favorites_only;
    }

    pub fn toggle_compact_view(&mut self) {
        self.compact_view = !self.compact_view;
    }

    /// Flip a server's favorite state. Returns whether it is a favorite now.
    pub fn on_toggle_favorite(&mut self, guid: &str) -> bool {
        let now_favorite = self.favorites.toggle(guid);
        let persisted = if now_favorite {
            self.favorites_store.add_favorite(guid)
        } else {
            self.favorites_store.remove_favorite(guid)
        };
        if let Err(e) = persisted {
            warn!(guid = %guid, error = %e, "Failed to persist favorite");
        }
        now_favorite
    }

    pub fn set_capabilities(&mut self, capabilities: ClientCapabilities) {
        if self.capabilities_pinned {
            debug!("Capabilities pinned by settings, host report ignored");
            return;
        }
        debug!(build = capabilities.build, "Client capabilities updated");
        self.capabilities = capabilities;
    }

    /// Start a refresh. Asking again while one is in flight resets the
    /// fetch status instead, and returns `None`.
    pub fn begin_refresh(&mut self) -> Option<u64> {
        self.gate.collapse();
        self.clicks.reset();

        if self.fetch_status == FetchStatus::Fetching {
            info!("Server fetch reset");
            self.fetch_status = FetchStatus::Idle;
            self.refresh_generation += 1;
            return None;
        }

        self.fetch_status = FetchStatus::Fetching;
        self.refresh_generation += 1;
        debug!(generation = self.refresh_generation, "Fetching servers");
        Some(self.refresh_generation)
    }

    /// Replace the list with a refresh response. Responses from any refresh
    /// but the latest are dropped.
    pub fn apply_server_list(&mut self, generation: u64, servers: Vec<ServerRecord>) -> bool {
        if generation != self.refresh_generation {
            debug!(generation, current = self.refresh_generation, "Stale server list dropped");
            return false;
        }
        info!(count = servers.len(), "Server list updated");
        self.servers = servers;
        self.fetch_status = FetchStatus::Idle;
        true
    }

    pub fn refresh_failed(&mut self, generation: u64) {
        if generation == self.refresh_generation {
            self.fetch_status = FetchStatus::Idle;
        }
    }

    // ------------------------------------------------------------------------
    // Row interaction
    // ------------------------------------------------------------------------

    /// Raw row click. Returns the activation outcome when this click was
    /// the second of a double click.
    pub fn on_row_click(&mut self, guid: &str, now: Instant) -> Option<GateOutcome> {
        let mut outcome = None;
        for event in self.clicks.click(guid, now) {
            outcome = self.apply_click(event);
        }
        outcome
    }

    /// The click window elapsed; fire any pending expand.
    pub fn on_click_timer(&mut self, now: Instant) {
        if let Some(event) = self.clicks.poll(now) {
            self.apply_click(event);
        }
    }

    fn apply_click(&mut self, event: ClickEvent) -> Option<GateOutcome> {
        match event {
            ClickEvent::Expand(guid) => {
                self.gate.expand(&guid);
                None
            }
            ClickEvent::Activate(guid) => Some(self.on_row_activate(&guid, ConnectMode::Join)),
        }
    }

    pub fn on_row_expand_toggle(&mut self, guid: &str) {
        self.gate.toggle_expand(guid);
    }

    pub fn on_row_activate(&mut self, guid: &str, mode: ConnectMode) -> GateOutcome {
        let Some(server) = self.servers.iter().find(|s| s.guid == guid) else {
            debug!(guid = %guid, "Activation for unknown server");
            return GateOutcome::Ignored;
        };
        self.gate.activate(server, mode, &self.capabilities)
    }

    pub fn accept_performance(&mut self) -> GateOutcome {
        let guid = match self.gate.state() {
            GateState::GatePerformance { guid, .. } => guid.clone(),
            _ => return GateOutcome::Ignored,
        };
        match self.servers.iter().find(|s| s.guid == guid) {
            Some(server) => self.gate.accept_performance(server, &self.capabilities),
            None => {
                // the server vanished in a refresh while the popup was open
                self.gate.decline();
                GateOutcome::Ignored
            }
        }
    }

    pub fn submit_password(&mut self, password: &str) -> GateOutcome {
        self.gate.submit_password(password)
    }

    pub fn decline_gate(&mut self) -> GateOutcome {
        self.gate.decline()
    }

    pub fn cancel_connect(&mut self) -> Option<ConnectionAttempt> {
        self.gate.cancel()
    }

    pub fn retry_connect(&mut self) -> GateOutcome {
        self.gate.retry()
    }

    pub fn dismiss_failure(&mut self) {
        self.gate.reset();
    }

    pub fn connect_result(
        &mut self,
        attempt_id: u64,
        result: std::result::Result<(), ConnectFailure>,
    ) -> bool {
        match result {
            Ok(()) => self.gate.connect_succeeded(attempt_id),
            Err(reason) => self.gate.connect_failed(attempt_id, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::MemoryFavorites;
    use crate::server::RawServerRecord;
    use serde_json::json;
    use std::time::Duration;

    fn record(guid: &str, ping: u32, passworded: bool) -> ServerRecord {
        let raw: RawServerRecord = serde_json::from_value(json!({
            "guid": guid,
            "name": guid,
            "ping": ping,
            "passworded": passworded,
            "variables": { "mapname": "Levels/MP_001/MP_001" },
        }))
        .unwrap();
        ServerRecord::from_raw(raw)
    }

    fn browser_with(servers: Vec<ServerRecord>, favorites: &[&str]) -> ServerBrowser {
        let mut browser = ServerBrowser::new(
            ClientCapabilities::default(),
            &Settings::default(),
            Box::new(MemoryFavorites::with(favorites)),
        );
        let generation = browser.begin_refresh().unwrap();
        assert!(browser.apply_server_list(generation, servers));
        browser
    }

    #[test]
    fn toggle_favorite_scenario() {
        let mut browser = browser_with(vec![record("A", 10, false), record("B", 20, false)], &["A"]);

        assert!(!browser.on_toggle_favorite("A"));
        assert!(browser.favorites().is_empty());

        assert!(browser.on_toggle_favorite("B"));
        assert!(browser.favorites().contains("B"));
        assert_eq!(browser.favorites().len(), 1);

        let rows = browser.visible_servers();
        assert!(rows.iter().find(|r| r.server.guid == "B").unwrap().is_favorite);
    }

    #[test]
    fn sort_column_clicks() {
        let mut browser = browser_with(vec![record("A", 10, false), record("B", 20, false)], &[]);
        browser.on_sort_column(SortColumn::Ping);
        let rows = browser.visible_servers();
        assert_eq!(rows[0].server.guid, "B");

        browser.on_sort_column(SortColumn::Players);
        assert_eq!(browser.sort().direction, SortDirection::Ascending);
    }

    #[test]
    fn stale_refresh_is_dropped() {
        let mut browser = browser_with(vec![record("A", 10, false)], &[]);
        let first = browser.begin_refresh().unwrap();
        // second request while fetching resets instead of refetching
        assert_eq!(browser.begin_refresh(), None);
        assert_eq!(browser.fetch_status(), FetchStatus::Idle);
        let second = browser.begin_refresh().unwrap();

        assert!(!browser.apply_server_list(first, vec![record("OLD", 1, false)]));
        assert!(browser.apply_server_list(second, vec![record("NEW", 1, false)]));
        assert_eq!(browser.servers().len(), 1);
        assert_eq!(browser.servers()[0].guid, "NEW");
    }

    #[test]
    fn refresh_collapses_expanded_row() {
        let mut browser = browser_with(vec![record("A", 10, false)], &[]);
        browser.on_row_expand_toggle("A");
        assert_eq!(browser.gate().expanded(), Some("A"));
        browser.begin_refresh();
        assert_eq!(browser.gate().expanded(), None);
    }

    #[test]
    fn double_click_joins_without_expanding() {
        let mut browser = browser_with(vec![record("A", 10, false)], &[]);
        let t0 = Instant::now();

        assert_eq!(browser.on_row_click("A", t0), None);
        let outcome = browser.on_row_click("A", t0 + Duration::from_millis(100));
        assert!(matches!(outcome, Some(GateOutcome::Connect(_))));
        assert_eq!(browser.gate().expanded(), None);
    }

    #[test]
    fn single_click_expands_after_window() {
        let mut browser = browser_with(vec![record("A", 10, false)], &[]);
        let t0 = Instant::now();

        browser.on_row_click("A", t0);
        browser.on_click_timer(t0 + Duration::from_millis(200));
        assert_eq!(browser.gate().expanded(), None);
        browser.on_click_timer(t0 + Duration::from_millis(351));
        assert_eq!(browser.gate().expanded(), Some("A"));
    }

    #[test]
    fn password_flow_through_store() {
        let mut browser = browser_with(vec![record("A", 10, true)], &[]);
        assert_eq!(browser.on_row_activate("A", ConnectMode::Join), GateOutcome::PasswordRequired);
        let GateOutcome::Connect(attempt) = browser.submit_password("secret") else {
            panic!("expected connect");
        };
        assert!(browser.connect_result(attempt.id, Err(ConnectFailure::Code(0))));
        assert_eq!(
            browser.gate().attempt_status(),
            AttemptStatus::Failed(ConnectFailure::Code(0))
        );
        browser.dismiss_failure();
        assert_eq!(browser.gate().attempt_status(), AttemptStatus::Idle);
    }

    #[test]
    fn unknown_server_activation_is_ignored() {
        let mut browser = browser_with(vec![], &[]);
        assert_eq!(browser.on_row_activate("nope", ConnectMode::Join), GateOutcome::Ignored);
    }

    #[test]
    fn performance_popup_for_vanished_server_closes() {
        let mut slow = record("A", 10, false);
        slow.fps = Some(5);
        let mut browser = browser_with(vec![slow], &[]);
        assert!(matches!(
            browser.on_row_activate("A", ConnectMode::Join),
            GateOutcome::PerformanceWarning(_)
        ));

        let generation = browser.begin_refresh().unwrap();
        browser.apply_server_list(generation, vec![]);
        assert_eq!(browser.accept_performance(), GateOutcome::Ignored);
        assert!(matches!(browser.gate().state(), GateState::Browsing { .. }));
    }

    #[test]
    fn pinned_capabilities_ignore_host_report() {
        let settings = Settings {
            capabilities: Some(ClientCapabilities { build: 19000, ..Default::default() }),
            ..Default::default()
        };
        let mut browser = ServerBrowser::new(
            ClientCapabilities::default(),
            &settings,
            Box::new(MemoryFavorites::default()),
        );
        browser.set_capabilities(ClientCapabilities { build: 1, ..Default::default() });
        assert_eq!(browser.capabilities().build, 19000);
    }

    #[test]
    fn settings_round_trip_through_store() {
        let mut browser = browser_with(vec![], &[]);
        browser.on_sort_column(SortColumn::Map);
        browser.toggle_favorites_only();
        browser.toggle_compact_view();
        let saved = browser.settings(&Settings::default());
        assert_eq!(saved.sort.sort_by, SortColumn::Map);
        assert!(saved.filters.favorites_only);
        assert!(saved.compact_view);
    }
}
