//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared result type.
pub type Result<T> = std::result::Result<T, ApmError>;

/// Error enumeration covering all failure modes of the runtime.
#[derive(Debug)]
pub enum ApmError {
    /// Write attempted against a read-only configuration source.
    NotSupported(String),
    /// Configuration is unusable (e.g. no socket path in attach mode).
    InvalidConfiguration(String),
    /// Engine operation invoked before `setup` completed.
    NoAgentPresent,
    /// Send attempted after the connection was shut down.
    Disconnected,
    /// `monitor` is false; telemetry is suppressed.
    MonitoringDisabled,
    /// Socket open or agent handshake failed.
    ConnectionFailed(String),
    /// Non-blocking setup called while setup is still in progress.
    InstanceNotReady,
    /// Socket path is neither a Unix path nor a `tcp://` endpoint.
    UnknownSocketType(String),
    /// Wire framing or JSON encode/decode failure.
    Codec(String),
    /// File-system or socket I/O failure.
    Io(String),
    /// Core-agent process spawn failure.
    Spawn(String),
    /// Core-agent binary could not be resolved by the downloader.
    Download(String),
}

impl Display for ApmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported(msg) => write!(f, "not supported: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::NoAgentPresent => write!(f, "no agent present: setup has not completed"),
            Self::Disconnected => write!(f, "disconnected: agent connection is closed"),
            Self::MonitoringDisabled => write!(f, "monitoring disabled"),
            Self::ConnectionFailed(msg) => write!(f, "connection failed: {msg}"),
            Self::InstanceNotReady => write!(f, "instance not ready: setup in progress"),
            Self::UnknownSocketType(msg) => write!(f, "unknown socket type: {msg}"),
            Self::Codec(msg) => write!(f, "codec: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Download(msg) => write!(f, "download: {msg}"),
        }
    }
}

impl std::error::Error for ApmError {}

impl From<std::io::Error> for ApmError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ApmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(format!("json: {err}"))
    }
}
