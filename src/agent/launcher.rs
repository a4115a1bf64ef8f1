//! Core-agent process spawner.
//!
//! Creates the agent run directory with the configured permission bits,
//! spawns the binary detached from the application's stdio, and waits for
//! the listening endpoint to come up before handing control back.

use std::path::Path;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::agent::address::SocketAddress;
use crate::config::value::LogLevel;
use crate::errors::{ApmError, Result};

/// How often the spawner re-probes the endpoint while waiting for the
/// agent to come up.
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period between asking the process to exit and force-killing it.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// A spawned core-agent process.
#[derive(Debug)]
pub struct LaunchedAgent {
    child: Child,
}

/// Spawn the core-agent binary and wait for its endpoint.
///
/// The agent is started as `core-agent start --socket <path> --log-level
/// <level>` (TCP endpoints use `--tcp <host:port>`), with stdio detached.
///
/// # Errors
///
/// - [`ApmError::Spawn`] — OS-level spawn failure or unusable run dir.
/// - [`ApmError::ConnectionFailed`] — the endpoint never came up within
///   `startup_timeout`.
pub async fn launch(
    binary: &Path,
    address: &SocketAddress,
    log_level: LogLevel,
    permissions: u32,
    startup_timeout: Duration,
) -> Result<LaunchedAgent> {
    if let SocketAddress::Unix(socket_path) = address {
        prepare_run_dir(socket_path, permissions).await?;
    }

    let mut cmd = Command::new(binary);
    cmd.arg("start");
    match address {
        SocketAddress::Unix(path) => {
            cmd.arg("--socket").arg(path);
        }
        SocketAddress::Tcp(endpoint) => {
            cmd.arg("--tcp").arg(endpoint);
        }
    }
    cmd.arg("--log-level").arg(log_level.as_str());

    cmd.stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(false);

    let child = cmd
        .spawn()
        .map_err(|e| ApmError::Spawn(format!("failed to spawn core agent: {e}")))?;

    info!(
        binary = %binary.display(),
        %address,
        log_level = %log_level,
        "core agent spawned"
    );

    wait_for_endpoint(address, startup_timeout).await?;

    Ok(LaunchedAgent { child })
}

impl LaunchedAgent {
    /// Ask the agent process to exit, force-killing after a grace period.
    pub async fn stop(mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            info!(?status, "core agent already exited");
            return;
        }

        if let Err(err) = self.child.start_kill() {
            warn!(%err, "failed to signal core agent");
            return;
        }

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "core agent stopped"),
            Ok(Err(err)) => warn!(%err, "error waiting for core agent to exit"),
            Err(_) => {
                warn!("core agent did not exit within grace period, forcing kill");
                if let Err(err) = self.child.kill().await {
                    warn!(%err, "failed to force-kill core agent");
                }
            }
        }
    }
}

/// Create the socket's parent directory with the configured mode.
async fn prepare_run_dir(socket_path: &Path, permissions: u32) -> Result<()> {
    let Some(dir) = socket_path.parent() else {
        return Err(ApmError::Spawn(format!(
            "socket path has no parent directory: {}",
            socket_path.display()
        )));
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApmError::Spawn(format!("cannot create {}: {e}", dir.display())))?;

    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(permissions))
        .await
        .map_err(|e| ApmError::Spawn(format!("cannot chmod {}: {e}", dir.display())))?;

    Ok(())
}

/// Poll the endpoint until it is reachable or the window lapses.
async fn wait_for_endpoint(address: &SocketAddress, startup_timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + startup_timeout;
    loop {
        if address.probe().await {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ApmError::ConnectionFailed(format!(
                "core agent did not open {address} within {startup_timeout:?}"
            )));
        }
        tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
    }
}
