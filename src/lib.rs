#![forbid(unsafe_code)]

//! Scout APM instrumentation runtime.
//!
//! Instruments an application process, producing a tree of timed requests
//! (top-level transactions) and nested spans (sub-operations), and ships
//! them over a local socket to the out-of-process Scout core agent, which
//! forwards telemetry upstream.
//!
//! The crate is organized around three tightly coupled subsystems:
//!
//! - [`config`] — a layered configuration resolver merging environment
//!   variables, embedder-supplied values, derived composites, and defaults
//!   with deterministic precedence.
//! - [`agent`] — the core-agent lifecycle: locating (and optionally
//!   launching) the agent binary, connecting over a Unix-domain or TCP
//!   socket, and driving the framed request/response protocol.
//! - [`Engine`] — the tracing engine: starts and stops requests and spans
//!   in an ambient asynchronous context and flushes framed telemetry to
//!   the agent.

pub mod agent;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod meta;
pub mod platform;
pub mod protocol;
pub mod scrub;
pub mod stats;
pub mod trace;
pub mod version;

pub use config::Config;
pub use engine::{Engine, EngineOptions};
pub use errors::{ApmError, Result};
pub use events::EngineEvent;
pub use meta::ApplicationMetadata;
pub use version::CoreAgentVersion;
