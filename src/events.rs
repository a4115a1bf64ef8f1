//! Events emitted by the engine to subscribers.

/// Engine event stream, including passthroughs of agent-connection
/// events.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine shut down.
    Shutdown,
    /// A request's telemetry was handed to the connection.
    RequestSent {
        /// Identifier of the flushed request.
        request_id: String,
    },
    /// A path matched a configured ignore prefix.
    IgnoredPathDetected {
        /// The matched path.
        path: String,
    },
    /// An ignored request reached its flush point and was dropped.
    IgnoredRequestProcessingSkipped {
        /// Identifier of the dropped request.
        request_id: String,
    },
    /// The agent socket opened.
    AgentConnected,
    /// The agent socket closed.
    AgentDisconnected,
    /// The agent rejected a message or a round-trip failed.
    AgentError {
        /// Failure detail.
        message: String,
    },
}
