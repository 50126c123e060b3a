//! The game host / matchmaking backend the browser talks to

use crate::app::ConnectionAttempt;
use crate::compat::ClientCapabilities;
use crate::error::{ConnectFailure, Error, Result};
use crate::server::{decode_server_list, ServerRecord};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Backend collaborator. Futures are `'static` so the session can spawn them.
pub trait Backend: Send + Sync {
    /// One full server list; each response replaces the previous one wholesale.
    fn request_server_list(&self) -> BoxFuture<'static, Result<Vec<ServerRecord>>>;

    fn connect(
        &self,
        attempt: ConnectionAttempt,
    ) -> BoxFuture<'static, std::result::Result<(), ConnectFailure>>;

    /// Drop an in-flight attempt the user cancelled.
    fn abandon(&self, guid: &str) -> BoxFuture<'static, ()>;

    fn client_capabilities(&self) -> BoxFuture<'static, Result<ClientCapabilities>>;
}

/// Reads the server list from a JSON file. Has no transport, so connecting
/// always fails.
pub struct FileBackend {
    servers_path: PathBuf,
    capabilities: ClientCapabilities,
}

impl FileBackend {
    pub fn new(servers_path: PathBuf, capabilities: ClientCapabilities) -> Self {
        Self { servers_path, capabilities }
    }
}

impl Backend for FileBackend {
    fn request_server_list(&self) -> BoxFuture<'static, Result<Vec<ServerRecord>>> {
        let path = self.servers_path.clone();
        async move {
            let json = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::FileRead(path.clone(), e))?;
            let servers = decode_server_list(&json)?;
            info!(count = servers.len(), path = %path.display(), "Server list loaded");
            Ok(servers)
        }
        .boxed()
    }

    fn connect(
        &self,
        attempt: ConnectionAttempt,
    ) -> BoxFuture<'static, std::result::Result<(), ConnectFailure>> {
        async move {
            debug!(guid = %attempt.guid, "File backend cannot connect");
            Err(ConnectFailure::Reason(
                "No game host attached to this browser.".to_string(),
            ))
        }
        .boxed()
    }

    fn abandon(&self, guid: &str) -> BoxFuture<'static, ()> {
        let guid = guid.to_string();
        async move { debug!(guid = %guid, "Nothing to abandon") }.boxed()
    }

    fn client_capabilities(&self) -> BoxFuture<'static, Result<ClientCapabilities>> {
        let caps = self.capabilities.clone();
        async move { Ok(caps) }.boxed()
    }
}
