//! Typed request and response objects for the agent protocol.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApmError, Result};

/// `event_type` of the application-metadata event sent at registration.
pub const EVENT_TYPE_METADATA: &str = "scout.metadata";

/// `event_type` of the periodic resident-memory sample.
pub const EVENT_TYPE_MEMORY_MB: &str = "MemoryUsageMB";

/// `event_type` of the periodic CPU-utilization sample.
pub const EVENT_TYPE_CPU_PERCENT: &str = "CPUUtilizationPercent";

/// Format a timestamp the way the agent expects: ISO-8601 UTC with
/// millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A request to the core agent.
///
/// Serde's external tagging produces exactly the wire shape: the variant
/// name is the discriminator key, the fields are its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiRequest {
    /// Announce the application; must be the first message sent.
    Register {
        app: String,
        key: String,
        api_version: String,
    },
    /// Out-of-band application event (metadata, CPU/memory samples).
    ApplicationEvent {
        event_type: String,
        event_value: Value,
        source: String,
        timestamp: String,
    },
    /// A request began.
    StartRequest {
        request_id: String,
        timestamp: String,
    },
    /// A request finished; the final message for its `request_id`.
    FinishRequest {
        request_id: String,
        timestamp: String,
    },
    /// Attach a tag to a request.
    TagRequest {
        request_id: String,
        tag: String,
        value: Value,
        timestamp: String,
    },
    /// A span began inside a request.
    StartSpan {
        request_id: String,
        span_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
        operation: String,
        timestamp: String,
    },
    /// A span finished.
    StopSpan {
        request_id: String,
        span_id: String,
        timestamp: String,
    },
    /// Attach a tag to a span.
    TagSpan {
        request_id: String,
        span_id: String,
        tag: String,
        value: Value,
        timestamp: String,
    },
}

impl ApiRequest {
    /// The discriminator key this request serializes under.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register { .. } => "Register",
            Self::ApplicationEvent { .. } => "ApplicationEvent",
            Self::StartRequest { .. } => "StartRequest",
            Self::FinishRequest { .. } => "FinishRequest",
            Self::TagRequest { .. } => "TagRequest",
            Self::StartSpan { .. } => "StartSpan",
            Self::StopSpan { .. } => "StopSpan",
            Self::TagSpan { .. } => "TagSpan",
        }
    }
}

/// A decoded agent response.
///
/// Responses are single-key JSON objects mirroring the request
/// discriminator; unknown discriminators decode fine and are judged purely
/// on `result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    /// Discriminator key echoed by the agent.
    pub kind: String,
    /// `"Success"` or `"Failure"`.
    pub result: String,
    /// Optional failure detail.
    pub message: Option<String>,
}

impl AgentResponse {
    /// Whether the agent accepted the request.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result == "Success"
    }

    /// Decode a response body (without the length prefix).
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::Codec`] when the payload is not a JSON object
    /// or carries no discriminator.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        let obj = value
            .as_object()
            .ok_or_else(|| ApmError::Codec("agent response is not a JSON object".into()))?;

        // Tolerate an untagged `{"result": …}` shape alongside the usual
        // `{"Discriminator": {"result": …}}`.
        if let Some(result) = obj.get("result").and_then(Value::as_str) {
            return Ok(Self {
                kind: "Response".to_owned(),
                result: result.to_owned(),
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            });
        }

        let (kind, body) = obj
            .iter()
            .next()
            .ok_or_else(|| ApmError::Codec("agent response object is empty".into()))?;

        Ok(Self {
            kind: kind.clone(),
            result: body
                .get("result")
                .and_then(Value::as_str)
                .unwrap_or("Failure")
                .to_owned(),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}
