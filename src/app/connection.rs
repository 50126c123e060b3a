//! Join/spectate gating and the connection attempt lifecycle

use crate::compat::{self, ClientCapabilities, Incompatibility};
use crate::error::ConnectFailure;
use crate::performance;
use crate::server::ServerRecord;
use crate::types::ConnectMode;
use tracing::{debug, info, warn};

/// A connect request that cleared every gate. At most one exists at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub id: u64,
    pub guid: String,
    pub mode: ConnectMode,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Idle,
    Connecting,
    Failed(ConnectFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Browsing { expanded: Option<String> },
    GatePassword { guid: String, mode: ConnectMode },
    GatePerformance { guid: String, mode: ConnectMode, message: &'static str },
    Connecting(ConnectionAttempt),
    ConnectionFailed { attempt: ConnectionAttempt, reason: ConnectFailure },
}

/// What an activation (or a gate answer) led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Busy, wrong state, or the action is not offered for this server
    Ignored,
    Blocked(Incompatibility),
    PerformanceWarning(&'static str),
    PasswordRequired,
    Declined,
    Connect(ConnectionAttempt),
}

#[derive(Debug)]
pub struct ConnectionGate {
    state: GateState,
    /// Expanded row to restore when a popup closes
    last_expanded: Option<String>,
    next_attempt_id: u64,
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self {
            state: GateState::Browsing { expanded: None },
            last_expanded: None,
            next_attempt_id: 1,
        }
    }
}

impl ConnectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn expanded(&self) -> Option<&str> {
        match &self.state {
            GateState::Browsing { expanded } => expanded.as_deref(),
            _ => self.last_expanded.as_deref(),
        }
    }

    pub fn attempt_status(&self) -> AttemptStatus {
        match &self.state {
            GateState::Connecting(_) => AttemptStatus::Connecting,
            GateState::ConnectionFailed { reason, .. } => AttemptStatus::Failed(reason.clone()),
            _ => AttemptStatus::Idle,
        }
    }

    pub fn current_attempt(&self) -> Option<&ConnectionAttempt> {
        match &self.state {
            GateState::Connecting(attempt) | GateState::ConnectionFailed { attempt, .. } => {
                Some(attempt)
            }
            _ => None,
        }
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.state, GateState::Connecting(_))
    }

    /// Expand a row (single click). Only meaningful while browsing.
    pub fn expand(&mut self, guid: &str) {
        if let GateState::Browsing { expanded } = &mut self.state {
            *expanded = Some(guid.to_string());
        }
    }

    pub fn toggle_expand(&mut self, guid: &str) {
        if let GateState::Browsing { expanded } = &mut self.state {
            if expanded.as_deref() == Some(guid) {
                *expanded = None;
            } else {
                *expanded = Some(guid.to_string());
            }
        }
    }

    pub fn collapse(&mut self) {
        self.last_expanded = None;
        if let GateState::Browsing { expanded } = &mut self.state {
            *expanded = None;
        }
    }

    /// Run the join/spectate gates for `server`.
    ///
    /// Order: compatibility, performance advisory, password, connect.
    pub fn activate(
        &mut self,
        server: &ServerRecord,
        mode: ConnectMode,
        caps: &ClientCapabilities,
    ) -> GateOutcome {
        if !self.accepts_activation() {
            debug!(guid = %server.guid, state = ?self.state, "Activation ignored");
            return GateOutcome::Ignored;
        }
        self.run_gates(server, mode, caps, false)
    }

    /// User confirmed the performance warning: re-run the gates without it.
    pub fn accept_performance(
        &mut self,
        server: &ServerRecord,
        caps: &ClientCapabilities,
    ) -> GateOutcome {
        let mode = match &self.state {
            GateState::GatePerformance { guid, mode, .. } if *guid == server.guid => *mode,
            _ => return GateOutcome::Ignored,
        };
        self.return_to_browsing();
        self.run_gates(server, mode, caps, true)
    }

    /// Password entered. Empty input connects without a password.
    pub fn submit_password(&mut self, password: &str) -> GateOutcome {
        let (guid, mode) = match &self.state {
            GateState::GatePassword { guid, mode } => (guid.clone(), *mode),
            _ => return GateOutcome::Ignored,
        };
        let password = (!password.is_empty()).then(|| password.to_string());
        self.start_attempt(guid, mode, password)
    }

    /// Close a password or performance popup without connecting.
    pub fn decline(&mut self) -> GateOutcome {
        match &self.state {
            GateState::GatePassword { guid, .. } | GateState::GatePerformance { guid, .. } => {
                debug!(guid = %guid, "Gate declined");
                self.return_to_browsing();
                GateOutcome::Declined
            }
            _ => GateOutcome::Ignored,
        }
    }

    /// Transport reported success for attempt `id`.
    pub fn connect_succeeded(&mut self, id: u64) -> bool {
        match &self.state {
            GateState::Connecting(attempt) if attempt.id == id => {
                info!(guid = %attempt.guid, mode = %attempt.mode, "Connected to server");
                self.return_to_browsing();
                true
            }
            _ => {
                debug!(id, "Stale connect success ignored");
                false
            }
        }
    }

    /// Transport reported failure for attempt `id`.
    pub fn connect_failed(&mut self, id: u64, reason: ConnectFailure) -> bool {
        match &self.state {
            GateState::Connecting(attempt) if attempt.id == id => {
                warn!(guid = %attempt.guid, reason = %reason, "Connect failed");
                let attempt = attempt.clone();
                self.state = GateState::ConnectionFailed { attempt, reason };
                true
            }
            _ => {
                debug!(id, "Stale connect failure ignored");
                false
            }
        }
    }

    /// Close the connecting popup. Returns the abandoned attempt so the
    /// backend can be told to drop it.
    pub fn cancel(&mut self) -> Option<ConnectionAttempt> {
        match std::mem::replace(&mut self.state, GateState::Browsing { expanded: None }) {
            GateState::Connecting(attempt) => {
                info!(guid = %attempt.guid, "Connect cancelled");
                self.return_to_browsing();
                Some(attempt)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Retry a failed attempt with the same server, mode and password.
    pub fn retry(&mut self) -> GateOutcome {
        match &self.state {
            GateState::ConnectionFailed { attempt, .. } => {
                let ConnectionAttempt { guid, mode, password, .. } = attempt.clone();
                self.start_attempt(guid, mode, password)
            }
            _ => GateOutcome::Ignored,
        }
    }

    /// Dismiss the failure popup.
    pub fn reset(&mut self) {
        if matches!(self.state, GateState::ConnectionFailed { .. }) {
            self.return_to_browsing();
        }
    }

    fn accepts_activation(&self) -> bool {
        matches!(
            self.state,
            GateState::Browsing { .. } | GateState::ConnectionFailed { .. }
        )
    }

    fn run_gates(
        &mut self,
        server: &ServerRecord,
        mode: ConnectMode,
        caps: &ClientCapabilities,
        skip_performance: bool,
    ) -> GateOutcome {
        if mode == ConnectMode::Spectate && !server.can_spectate() {
            debug!(guid = %server.guid, "Server has no spectator slots");
            return GateOutcome::Ignored;
        }

        if let Some(reason) = compat::evaluate(server, caps).reason() {
            debug!(guid = %server.guid, reason = ?reason, "Activation blocked");
            return GateOutcome::Blocked(reason);
        }

        if !skip_performance {
            let advice = performance::advise(server);
            if let (true, Some(message)) = (advice.warn, advice.message) {
                self.leave_browsing(GateState::GatePerformance {
                    guid: server.guid.clone(),
                    mode,
                    message,
                });
                return GateOutcome::PerformanceWarning(message);
            }
        }

        if server.passworded {
            self.leave_browsing(GateState::GatePassword { guid: server.guid.clone(), mode });
            return GateOutcome::PasswordRequired;
        }

        self.start_attempt(server.guid.clone(), mode, None)
    }

    fn start_attempt(
        &mut self,
        guid: String,
        mode: ConnectMode,
        password: Option<String>,
    ) -> GateOutcome {
        let attempt = ConnectionAttempt { id: self.next_attempt_id, guid, mode, password };
        self.next_attempt_id += 1;
        info!(guid = %attempt.guid, mode = %attempt.mode, id = attempt.id, "Connecting");
        self.leave_browsing(GateState::Connecting(attempt.clone()));
        GateOutcome::Connect(attempt)
    }

    fn leave_browsing(&mut self, next: GateState) {
        if let GateState::Browsing { expanded } = &self.state {
            self.last_expanded = expanded.clone();
        }
        self.state = next;
    }

    fn return_to_browsing(&mut self) {
        self.state = GateState::Browsing { expanded: self.last_expanded.take() };
    }
}
