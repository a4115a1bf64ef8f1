//! Agent socket endpoints: parsing, selection, and reachability probing.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::config::Config;
use crate::errors::{ApmError, Result};
use crate::version::CoreAgentVersion;

/// TCP endpoint used by default for core agents that speak TCP.
pub const DEFAULT_TCP_ENDPOINT: &str = "tcp://127.0.0.1:6590";

/// First core-agent version that listens on TCP by default.
const TCP_DEFAULT_SINCE: &str = "1.3.0";

/// How long a reachability probe waits before declaring the endpoint dead.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// A parsed agent endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    /// Unix-domain socket path.
    Unix(PathBuf),
    /// TCP `host:port` endpoint.
    Tcp(String),
}

impl SocketAddress {
    /// Parse a configured socket path literally.
    ///
    /// `tcp://host:port` selects TCP; a plain path selects Unix.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::UnknownSocketType`] for any other URL scheme.
    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(endpoint) = raw.strip_prefix("tcp://") {
            if endpoint.is_empty() {
                return Err(ApmError::UnknownSocketType(format!(
                    "tcp endpoint missing host: {raw}"
                )));
            }
            return Ok(Self::Tcp(endpoint.to_owned()));
        }
        if raw.contains("://") {
            return Err(ApmError::UnknownSocketType(raw.to_owned()));
        }
        Ok(Self::Unix(PathBuf::from(raw)))
    }

    /// Select the endpoint for a configuration.
    ///
    /// An explicitly configured `socketPath` (environment or embedder) is
    /// used literally. Otherwise the configured agent version decides:
    /// versions before 1.3.0 use the derived Unix socket path, later
    /// versions the default TCP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::UnknownSocketType`] when an explicit path has an
    /// unrecognized scheme.
    pub fn for_config(config: &Config) -> Result<Self> {
        if let Some(explicit) = config.get_override("socketPath") {
            return Self::parse(&explicit.into_string());
        }
        if config.core_agent_version() >= CoreAgentVersion::parse(TCP_DEFAULT_SINCE) {
            Self::parse(DEFAULT_TCP_ENDPOINT)
        } else {
            Ok(Self::Unix(PathBuf::from(config.socket_path())))
        }
    }

    /// Whether something is listening at this endpoint.
    ///
    /// Unix: the path exists and is a socket. TCP: a connection attempt
    /// succeeds within the probe window.
    pub async fn probe(&self) -> bool {
        match self {
            Self::Unix(path) => match tokio::fs::metadata(path).await {
                Ok(meta) => {
                    use std::os::unix::fs::FileTypeExt;
                    meta.file_type().is_socket()
                }
                Err(_) => false,
            },
            Self::Tcp(endpoint) => {
                match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(endpoint)).await {
                    Ok(Ok(_stream)) => true,
                    _ => false,
                }
            }
        }
    }
}

impl Display for SocketAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(endpoint) => write!(f, "tcp://{endpoint}"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
