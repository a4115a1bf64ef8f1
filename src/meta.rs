//! Application metadata sent once at agent registration.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::errors::Result;
use crate::protocol::format_timestamp;

/// Frozen snapshot of the application, captured at registration and sent
/// as the `scout.metadata` application event.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApplicationMetadata {
    /// Implementation language.
    pub language: String,
    /// Language version the crate was built against.
    pub version: String,
    /// Same as `version`; kept as its own key on the wire.
    pub language_version: String,
    /// Wall-clock time of capture.
    pub server_time: String,
    /// Web framework, when the embedder reports one.
    pub framework: String,
    /// Web framework version.
    pub framework_version: String,
    /// Deployment environment (staging, production, …).
    pub environment: String,
    /// Application server in front of the process.
    pub app_server: String,
    /// Machine hostname.
    pub hostname: String,
    /// Primary database engine.
    pub database_engine: String,
    /// Database driver/adapter.
    pub database_adapter: String,
    /// Application name, as registered.
    pub application_name: String,
    /// `[name, version]` pairs of notable linked libraries.
    pub libraries: Vec<(String, String)>,
    /// Platform-as-a-service provider, when detectable.
    pub paas: String,
    /// Application root directory.
    pub application_root: String,
    /// Subdirectory of the SCM checkout the app lives in.
    pub scm_subdirectory: String,
    /// Deployed git SHA.
    pub git_sha: String,
}

impl ApplicationMetadata {
    /// Capture metadata from configuration and the environment.
    #[must_use]
    pub fn capture(config: &Config) -> Self {
        let language_version = option_env!("CARGO_PKG_RUST_VERSION")
            .unwrap_or("unknown")
            .to_owned();
        Self {
            language: "rust".to_owned(),
            version: language_version.clone(),
            language_version,
            server_time: format_timestamp(Utc::now()),
            framework: config.framework(),
            framework_version: config.framework_version(),
            environment: config.environment(),
            app_server: config.app_server(),
            hostname: config.hostname(),
            database_engine: String::new(),
            database_adapter: String::new(),
            application_name: config.name(),
            libraries: Vec::new(),
            paas: String::new(),
            application_root: config.application_root(),
            scm_subdirectory: String::new(),
            git_sha: config.revision_sha(),
        }
    }

    /// The key/value map carried as the event value on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ApmError::Codec`] on serialization failure (which
    /// cannot occur for this shape in practice).
    pub fn to_event_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Into::into)
    }
}
