//! Async driver for the browser store
//!
//! One task owns the `ServerBrowser`. UI events, backend completions and the
//! click timer all arrive through a single `select!` loop, and every turn
//! publishes a fresh `Snapshot` on a watch channel.

use super::{FilterSpec, GateOutcome, GateState, ServerBrowser, ServerRow};
use crate::backend::Backend;
use crate::compat::ClientCapabilities;
use crate::constants::CONNECT_DELAY;
use crate::error::{ConnectFailure, Result};
use crate::server::ServerRecord;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input from the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Refresh,
    /// Ask the host again for installed packs and builds
    RefreshCapabilities,
    RowClick(String),
    ExpandToggle(String),
    Activate { guid: String, mode: ConnectMode },
    SortColumn(SortColumn),
    SetFilter(FilterSpec),
    ToggleFavorite(String),
    ToggleFavoritesOnly,
    ToggleCompactView,
    AcceptPerformance,
    SubmitPassword(String),
    DeclineGate,
    CancelConnect,
    RetryConnect,
    DismissFailure,
    Shutdown,
}

/// Everything a view needs to render one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub rows: Vec<ServerRow>,
    pub count_text: String,
    pub fetch_status: FetchStatus,
    pub refresh_generation: u64,
    /// Why the latest refresh failed, if it did
    pub refresh_error: Option<String>,
    pub sort: SortState,
    pub filters: FilterSpec,
    pub filter_applied: bool,
    pub compact_view: bool,
    pub expanded: Option<String>,
    pub gate: GateState,
    pub last_outcome: Option<GateOutcome>,
    pub capabilities: ClientCapabilities,
}

enum Completion {
    ServerList { generation: u64, result: Result<Vec<ServerRecord>> },
    Capabilities(Result<ClientCapabilities>),
    Connect { id: u64, result: std::result::Result<(), ConnectFailure> },
}

/// The UI side of a running session
pub struct SessionHandle {
    events: mpsc::UnboundedSender<UiEvent>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionHandle {
    /// Queue an event. Returns false once the session has stopped.
    pub fn send(&self, event: UiEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `f`
    pub async fn wait_for(&mut self, f: impl FnMut(&Snapshot) -> bool) -> Option<Snapshot> {
        self.snapshots.wait_for(f).await.ok().map(|s| (*s).clone())
    }
}

pub struct Session {
    browser: ServerBrowser,
    backend: Arc<dyn Backend>,
    events: mpsc::UnboundedReceiver<UiEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    snapshots: watch::Sender<Snapshot>,
    connect_token: Option<CancellationToken>,
    last_outcome: Option<GateOutcome>,
    refresh_error: Option<String>,
}

impl Session {
    pub fn new(browser: ServerBrowser, backend: Arc<dyn Backend>) -> (Self, SessionHandle) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(snapshot_of(&browser, None, None));

        let session = Self {
            browser,
            backend,
            events,
            completions_tx,
            completions,
            snapshots,
            connect_token: None,
            last_outcome: None,
            refresh_error: None,
        };
        let handle = SessionHandle { events: events_tx, snapshots: snapshots_rx };
        (session, handle)
    }

    /// Drive the session until `Shutdown` or every handle is dropped.
    /// Hands the store back so its settings can be saved.
    pub async fn run(mut self) -> ServerBrowser {
        info!("Browser session started");
        self.fetch_capabilities();
        self.refresh();
        self.publish();

        loop {
            let deadline = self.browser.click_deadline();
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(UiEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
                Some(done) = self.completions.recv() => self.handle_completion(done),
                _ = click_timer(deadline) => self.browser.on_click_timer(Instant::now()),
            }
            self.publish();
        }

        if let Some(token) = self.connect_token.take() {
            token.cancel();
        }
        info!("Browser session stopped");
        self.browser
    }

    fn handle_event(&mut self, event: UiEvent) {
        debug!(event = ?event, "UI event");
        match event {
            UiEvent::Refresh => self.refresh(),
            UiEvent::RefreshCapabilities => self.fetch_capabilities(),
            UiEvent::RowClick(guid) => {
                if let Some(outcome) = self.browser.on_row_click(&guid, Instant::now()) {
                    self.apply_outcome(outcome);
                }
            }
            UiEvent::ExpandToggle(guid) => self.browser.on_row_expand_toggle(&guid),
            UiEvent::Activate { guid, mode } => {
                let outcome = self.browser.on_row_activate(&guid, mode);
                self.apply_outcome(outcome);
            }
            UiEvent::SortColumn(column) => self.browser.on_sort_column(column),
            UiEvent::SetFilter(filters) => self.browser.on_set_filter(filters),
            UiEvent::ToggleFavorite(guid) => {
                self.browser.on_toggle_favorite(&guid);
            }
            UiEvent::ToggleFavoritesOnly => self.browser.toggle_favorites_only(),
            UiEvent::ToggleCompactView => self.browser.toggle_compact_view(),
            UiEvent::AcceptPerformance => {
                let outcome = self.browser.accept_performance();
                self.apply_outcome(outcome);
            }
            UiEvent::SubmitPassword(password) => {
                let outcome = self.browser.submit_password(&password);
                self.apply_outcome(outcome);
            }
            UiEvent::DeclineGate => {
                let outcome = self.browser.decline_gate();
                self.apply_outcome(outcome);
            }
            UiEvent::CancelConnect => self.cancel_connect(),
            UiEvent::RetryConnect => {
                let outcome = self.browser.retry_connect();
                self.apply_outcome(outcome);
            }
            UiEvent::DismissFailure => self.browser.dismiss_failure(),
            // handled by the run loop
            UiEvent::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::ServerList { generation, result } => match result {
                Ok(servers) => {
                    if self.browser.apply_server_list(generation, servers) {
                        self.refresh_error = None;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Server list request failed");
                    if generation == self.browser.refresh_generation() {
                        self.refresh_error = Some(e.to_string());
                    }
                    self.browser.refresh_failed(generation);
                }
            },
            Completion::Capabilities(result) => match result {
                Ok(caps) => self.browser.set_capabilities(caps),
                Err(e) => warn!(error = %e, "Failed to read client capabilities"),
            },
            Completion::Connect { id, result } => {
                if self.browser.connect_result(id, result) {
                    self.connect_token = None;
                }
            }
        }
    }

    fn apply_outcome(&mut self, outcome: GateOutcome) {
        if let GateOutcome::Connect(attempt) = &outcome {
            self.spawn_connect(attempt.clone());
        }
        self.last_outcome = Some(outcome);
    }

    fn refresh(&mut self) {
        let Some(generation) = self.browser.begin_refresh() else {
            return;
        };
        let request = self.backend.request_server_list();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = request.await;
            let _ = tx.send(Completion::ServerList { generation, result });
        });
    }

    fn fetch_capabilities(&self) {
        let request = self.backend.client_capabilities();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Completion::Capabilities(request.await));
        });
    }

    /// Connect after a short delay so the connecting popup is seen.
    /// Cancelling before the backend answers drops the result.
    fn spawn_connect(&mut self, attempt: super::ConnectionAttempt) {
        if let Some(previous) = self.connect_token.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.connect_token = Some(token.clone());

        let backend = self.backend.clone();
        let tx = self.completions_tx.clone();
        let id = attempt.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(id, "Connect task cancelled");
                }
                result = async {
                    tokio::time::sleep(CONNECT_DELAY).await;
                    backend.connect(attempt).await
                } => {
                    let _ = tx.send(Completion::Connect { id, result });
                }
            }
        });
    }

    fn cancel_connect(&mut self) {
        let Some(attempt) = self.browser.cancel_connect() else {
            return;
        };
        if let Some(token) = self.connect_token.take() {
            token.cancel();
        }
        self.last_outcome = None;
        tokio::spawn(self.backend.abandon(&attempt.guid));
    }

    fn publish(&self) {
        self.snapshots.send_replace(snapshot_of(
            &self.browser,
            self.last_outcome.clone(),
            self.refresh_error.clone(),
        ));
    }
}

fn snapshot_of(
    browser: &ServerBrowser,
    last_outcome: Option<GateOutcome>,
    refresh_error: Option<String>,
) -> Snapshot {
    let rows = browser.visible_servers();
    Snapshot {
        count_text: super::server_count_text(rows.len(), browser.fetch_status()),
        rows,
        fetch_status: browser.fetch_status(),
        refresh_generation: browser.refresh_generation(),
        refresh_error,
        sort: browser.sort(),
        filters: browser.filters().clone(),
        filter_applied: browser.has_filter_applied(),
        compact_view: browser.compact_view(),
        expanded: browser.gate().expanded().map(str::to_string),
        gate: browser.gate().state().clone(),
        last_outcome,
        capabilities: browser.capabilities().clone(),
    }
}

async fn click_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ConnectionAttempt;
    use crate::compat::Incompatibility;
    use crate::constants::CLICK_WINDOW;
    use crate::favorites::MemoryFavorites;
    use crate::server::decode_server_list;
    use crate::settings::Settings;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls {
        connects: Vec<(ConnectionAttempt, Instant)>,
        abandoned: Vec<String>,
        list_requests: usize,
    }

    struct MockBackend {
        servers: Vec<ServerRecord>,
        list_fails: bool,
        capabilities: Arc<Mutex<ClientCapabilities>>,
        connect_result: std::result::Result<(), ConnectFailure>,
        calls: Arc<Mutex<Calls>>,
    }

    impl MockBackend {
        fn new(json: &str) -> Self {
            Self {
                servers: decode_server_list(json).unwrap(),
                list_fails: false,
                capabilities: Arc::default(),
                connect_result: Ok(()),
                calls: Arc::default(),
            }
        }
    }

    impl Backend for MockBackend {
        fn request_server_list(&self) -> BoxFuture<'static, Result<Vec<ServerRecord>>> {
            self.calls.lock().unwrap().list_requests += 1;
            let servers = self.servers.clone();
            let fails = self.list_fails;
            async move {
                if fails {
                    return Err(crate::error::Error::Backend("host offline".into()));
                }
                Ok(servers)
            }
            .boxed()
        }

        fn connect(
            &self,
            attempt: ConnectionAttempt,
        ) -> BoxFuture<'static, std::result::Result<(), ConnectFailure>> {
            self.calls.lock().unwrap().connects.push((attempt, Instant::now()));
            let result = self.connect_result.clone();
            async move { result }.boxed()
        }

        fn abandon(&self, guid: &str) -> BoxFuture<'static, ()> {
            self.calls.lock().unwrap().abandoned.push(guid.to_string());
            async {}.boxed()
        }

        fn client_capabilities(&self) -> BoxFuture<'static, Result<ClientCapabilities>> {
            let caps = self.capabilities.lock().unwrap().clone();
            async move { Ok(caps) }.boxed()
        }
    }

    const SERVERS: &str = r#"[
        {"guid": "a", "name": "Alpha", "ping": 30, "variables": {"maxspectators": "2"}},
        {"guid": "b", "name": "Bravo", "ping": 10, "passworded": true}
    ]"#;

    fn start(backend: MockBackend) -> (SessionHandle, Arc<Mutex<Calls>>) {
        let calls = backend.calls.clone();
        let browser = ServerBrowser::new(
            ClientCapabilities::default(),
            &Settings::default(),
            Box::new(MemoryFavorites::default()),
        );
        let (session, handle) = Session::new(browser, Arc::new(backend));
        tokio::spawn(session.run());
        (handle, calls)
    }

    async fn wait_until(
        handle: &mut SessionHandle,
        f: impl FnMut(&Snapshot) -> bool,
    ) -> Snapshot {
        tokio::time::timeout(Duration::from_secs(30), handle.wait_for(f))
            .await
            .expect("timed out waiting for snapshot")
            .expect("session stopped")
    }

    async fn loaded(backend: MockBackend) -> (SessionHandle, Arc<Mutex<Calls>>) {
        let (mut handle, calls) = start(backend);
        wait_until(&mut handle, |s| s.rows.len() == 2 && s.fetch_status == FetchStatus::Idle).await;
        (handle, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn startup_fetches_and_sorts_by_ping() {
        let (handle, calls) = loaded(MockBackend::new(SERVERS)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.rows[0].server.guid, "b");
        assert_eq!(snapshot.count_text, "Found 2 servers");
        assert_eq!(calls.lock().unwrap().list_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn double_click_connects_after_delay() {
        let (mut handle, calls) = loaded(MockBackend::new(SERVERS)).await;
        let clicked_at = Instant::now();
        handle.send(UiEvent::RowClick("a".into()));
        handle.send(UiEvent::RowClick("a".into()));

        wait_until(&mut handle, |s| matches!(s.gate, GateState::Connecting(_))).await;
        let snapshot = wait_until(&mut handle, |s| matches!(s.gate, GateState::Browsing { .. })).await;
        assert_eq!(snapshot.expanded, None);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects.len(), 1);
        let (attempt, at) = &calls.connects[0];
        assert_eq!(attempt.guid, "a");
        assert_eq!(attempt.mode, ConnectMode::Join);
        assert!(*at - clicked_at >= CONNECT_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn single_click_expands_when_window_closes() {
        let (mut handle, calls) = loaded(MockBackend::new(SERVERS)).await;
        let clicked_at = Instant::now();
        handle.send(UiEvent::RowClick("a".into()));

        wait_until(&mut handle, |s| s.expanded.as_deref() == Some("a")).await;
        assert!(Instant::now() - clicked_at >= CLICK_WINDOW);
        assert!(calls.lock().unwrap().connects.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_never_connects() {
        let (mut handle, calls) = loaded(MockBackend::new(SERVERS)).await;
        handle.send(UiEvent::Activate { guid: "a".into(), mode: ConnectMode::Spectate });
        wait_until(&mut handle, |s| matches!(s.gate, GateState::Connecting(_))).await;

        handle.send(UiEvent::CancelConnect);
        wait_until(&mut handle, |s| matches!(s.gate, GateState::Browsing { .. })).await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        let calls = calls.lock().unwrap();
        assert!(calls.connects.is_empty());
        assert_eq!(calls.abandoned, vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn password_is_forwarded_to_backend() {
        let (mut handle, calls) = loaded(MockBackend::new(SERVERS)).await;
        handle.send(UiEvent::Activate { guid: "b".into(), mode: ConnectMode::Join });
        wait_until(&mut handle, |s| matches!(s.gate, GateState::GatePassword { .. })).await;

        handle.send(UiEvent::SubmitPassword("pw".into()));
        wait_until(&mut handle, |s| matches!(s.gate, GateState::Browsing { .. })).await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.connects.len(), 1);
        assert_eq!(calls.connects[0].0.password.as_deref(), Some("pw"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_then_retry() {
        let mut backend = MockBackend::new(SERVERS);
        backend.connect_result = Err(ConnectFailure::Code(23));
        let (mut handle, calls) = loaded(backend).await;

        handle.send(UiEvent::Activate { guid: "a".into(), mode: ConnectMode::Join });
        let snapshot =
            wait_until(&mut handle, |s| matches!(s.gate, GateState::ConnectionFailed { .. })).await;
        let GateState::ConnectionFailed { reason, .. } = snapshot.gate else {
            unreachable!();
        };
        assert_eq!(reason, ConnectFailure::Code(23));

        handle.send(UiEvent::RetryConnect);
        wait_until(&mut handle, |_| calls.lock().unwrap().connects.len() == 2).await;
    }

    #[tokio::test(start_paused = true)]
    async fn favorites_only_toggle() {
        let (mut handle, _calls) = loaded(MockBackend::new(SERVERS)).await;
        handle.send(UiEvent::ToggleFavorite("a".into()));
        handle.send(UiEvent::ToggleFavoritesOnly);
        let snapshot = wait_until(&mut handle, |s| s.rows.len() == 1).await;
        assert_eq!(snapshot.rows[0].server.guid, "a");
        assert!(snapshot.rows[0].is_favorite);
        assert!(snapshot.filter_applied);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_is_reported() {
        let mut backend = MockBackend::new(SERVERS);
        backend.list_fails = true;
        let (mut handle, _calls) = start(backend);
        let snapshot = wait_until(&mut handle, |s| s.refresh_error.is_some()).await;
        assert_eq!(snapshot.fetch_status, FetchStatus::Idle);
        assert_eq!(snapshot.refresh_generation, 1);
        assert!(snapshot.rows.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refreshed_capabilities_unblock_join() {
        let backend = MockBackend::new(
            r#"[{"guid": "new", "name": "New", "variables": {"min_buildno": "200"}}]"#,
        );
        let capabilities = backend.capabilities.clone();
        let (mut handle, calls) = start(backend);
        let snapshot = wait_until(&mut handle, |s| s.rows.len() == 1).await;
        assert_eq!(
            snapshot.rows[0].notice(&snapshot.capabilities).as_deref(),
            Some(Incompatibility::ClientBuildOutdated.message())
        );

        handle.send(UiEvent::Activate { guid: "new".into(), mode: ConnectMode::Join });
        let snapshot = wait_until(&mut handle, |s| s.last_outcome.is_some()).await;
        assert_eq!(
            snapshot.last_outcome,
            Some(GateOutcome::Blocked(Incompatibility::ClientBuildOutdated))
        );

        capabilities.lock().unwrap().build = 300;
        handle.send(UiEvent::RefreshCapabilities);
        let snapshot = wait_until(&mut handle, |s| s.capabilities.build == 300).await;
        assert_eq!(snapshot.rows[0].notice(&snapshot.capabilities), None);

        handle.send(UiEvent::Activate { guid: "new".into(), mode: ConnectMode::Join });
        wait_until(&mut handle, |_| calls.lock().unwrap().connects.len() == 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_store() {
        let calls = Arc::<Mutex<Calls>>::default();
        let mut backend = MockBackend::new(SERVERS);
        backend.calls = calls.clone();
        let browser = ServerBrowser::new(
            ClientCapabilities::default(),
            &Settings::default(),
            Box::new(MemoryFavorites::default()),
        );
        let (session, handle) = Session::new(browser, Arc::new(backend));
        let task = tokio::spawn(session.run());
        handle.send(UiEvent::ToggleCompactView);
        handle.send(UiEvent::Shutdown);
        let browser = task.await.unwrap();
        assert!(browser.compact_view());
    }

    #[tokio::test(start_paused = true)]
    async fn session_changes_survive_settings_save() {
        let dir = tempfile::tempdir().unwrap();
        let before = Settings::default();
        let browser = ServerBrowser::new(
            ClientCapabilities::default(),
            &before,
            Box::new(MemoryFavorites::default()),
        );
        let (session, handle) = Session::new(browser, Arc::new(MockBackend::new(SERVERS)));
        let task = tokio::spawn(session.run());
        handle.send(UiEvent::SortColumn(SortColumn::Players));
        handle.send(UiEvent::ToggleFavoritesOnly);
        handle.send(UiEvent::Shutdown);

        let browser = task.await.unwrap();
        browser.settings(&before).save(dir.path());

        let loaded = Settings::load(dir.path());
        assert_eq!(loaded.sort.sort_by, SortColumn::Players);
        assert!(loaded.filters.favorites_only);
    }
}
