//! Core-agent lifecycle: locating and launching the agent binary,
//! connecting to its socket, and driving the framed protocol.

pub mod address;
pub mod connection;
pub mod download;
pub mod launcher;
pub mod manager;

pub use address::SocketAddress;
pub use connection::{AgentConnection, ConnectionEvent};
pub use download::{CacheDownloader, DownloadOptions, Downloader};
pub use launcher::LaunchedAgent;
pub use manager::{AgentManager, AgentState};
