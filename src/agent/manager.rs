//! Agent lifecycle state machine.
//!
//! ```text
//!   Uninitialized → Connecting → Ready → ShuttingDown → Closed
//!                        │
//!                        └──→ Failed (terminal unless reset)
//! ```
//!
//! The manager decides launch-vs-attach from configuration, produces the
//! open [`AgentConnection`], and owns the spawned process handle for the
//! reverse path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::agent::address::SocketAddress;
use crate::agent::connection::AgentConnection;
use crate::agent::download::{DownloadOptions, Downloader};
use crate::agent::launcher::{self, LaunchedAgent};
use crate::config::Config;
use crate::errors::{ApmError, Result};

/// Lifecycle state of the agent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Nothing attempted yet.
    Uninitialized,
    /// Setup in progress: locating, spawning, connecting.
    Connecting,
    /// Connected and registered; telemetry flows.
    Ready,
    /// Setup failed; stays failed unless reset.
    Failed,
    /// Teardown in progress.
    ShuttingDown,
    /// Torn down.
    Closed,
}

/// Owns the path from configuration to an open agent connection.
pub struct AgentManager {
    config: Arc<Config>,
    downloader: Arc<dyn Downloader>,
    connect_timeout: Duration,
    state: Mutex<AgentState>,
    connection: Mutex<Option<Arc<AgentConnection>>>,
    launched: AsyncMutex<Option<LaunchedAgent>>,
}

impl AgentManager {
    /// Create an idle manager.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        downloader: Arc<dyn Downloader>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            config,
            downloader,
            connect_timeout,
            state: Mutex::new(AgentState::Uninitialized),
            connection: Mutex::new(None),
            launched: AsyncMutex::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(AgentState::Failed)
    }

    /// The open connection, when `Ready`.
    #[must_use]
    pub fn connection(&self) -> Option<Arc<AgentConnection>> {
        self.connection.lock().ok().and_then(|c| c.clone())
    }

    /// Drive the lifecycle to `Ready`: launch or attach, then connect.
    ///
    /// # Errors
    ///
    /// - [`ApmError::Download`] — the binary could not be resolved.
    /// - [`ApmError::Spawn`] — the agent process could not be started.
    /// - [`ApmError::InvalidConfiguration`] — attach mode with nothing
    ///   listening at the configured endpoint.
    /// - [`ApmError::ConnectionFailed`] — the socket never opened or the
    ///   connect attempt failed.
    ///
    /// Any failure leaves the manager in `Failed`.
    pub async fn start(&self) -> Result<Arc<AgentConnection>> {
        self.set_state(AgentState::Connecting);
        match self.start_inner().await {
            Ok(connection) => {
                self.set_state(AgentState::Ready);
                Ok(connection)
            }
            Err(err) => {
                self.set_state(AgentState::Failed);
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<Arc<AgentConnection>> {
        let address = SocketAddress::for_config(&self.config)?;

        if self.config.core_agent_launch() {
            let version = self.config.core_agent_version();
            let options = DownloadOptions {
                cache_dir: PathBuf::from(self.config.core_agent_dir()),
                download_url: self.config.download_url(),
                disallow_download: !self.config.core_agent_download(),
            };
            let binary = self.downloader.fetch(&version, &options).await?;
            let launched = launcher::launch(
                &binary,
                &address,
                self.config.core_agent_log_level(),
                self.config.core_agent_permissions(),
                self.connect_timeout,
            )
            .await?;
            *self.launched.lock().await = Some(launched);
        } else if !address.probe().await {
            return Err(ApmError::InvalidConfiguration(format!(
                "core agent launch is disabled and nothing is listening at {address}"
            )));
        }

        let connection = Arc::new(AgentConnection::connect(&address, self.connect_timeout).await?);
        if let Ok(mut slot) = self.connection.lock() {
            *slot = Some(Arc::clone(&connection));
        }
        info!(%address, "agent link ready");
        Ok(connection)
    }

    /// Tear down: disconnect, optionally stop the spawned process.
    pub async fn stop(&self, stop_process: bool) {
        self.set_state(AgentState::ShuttingDown);

        let connection = self
            .connection
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(connection) = connection {
            connection.disconnect();
        }

        if let Some(launched) = self.launched.lock().await.take() {
            if stop_process {
                launched.stop().await;
            } else {
                warn!("leaving spawned core agent running (shutdown not allowed)");
            }
        }

        self.set_state(AgentState::Closed);
    }

    fn set_state(&self, next: AgentState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
