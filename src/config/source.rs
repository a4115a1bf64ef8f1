//! Ordered configuration sources.
//!
//! Each source answers `get(prop)` independently; the resolver in
//! [`mod@crate::config`] queries them in precedence order. Only the Node
//! source (values supplied by the embedding program) accepts writes.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use tracing::warn;

use crate::errors::{ApmError, Result};

use super::value::{ConfigValue, LogLevel};

/// Properties parsed as case-insensitive `"true"` booleans.
const BOOL_PROPS: &[&str] = &[
    "coreAgentDownload",
    "coreAgentLaunch",
    "monitor",
    "allowShutdown",
    "collectRemoteIP",
];

/// Properties parsed as comma-separated lists (no trimming).
const LIST_PROPS: &[&str] = &["disabledInstruments", "ignore"];

/// Properties parsed as decimal integers.
const INT_PROPS: &[&str] = &["coreAgentPermissions"];

/// Properties validated against the log-level enum.
const LEVEL_PROPS: &[&str] = &["logLevel", "coreAgentLogLevel"];

/// A named resolver over the configuration record.
pub trait ConfigSource: Send + Sync {
    /// Source name, for diagnostics.
    fn name(&self) -> &'static str;

    /// The source's value for `prop`, or `None` when absent.
    fn get(&self, prop: &str) -> Option<ConfigValue>;

    /// Write `value` for `prop`.
    ///
    /// # Errors
    ///
    /// Read-only sources return [`ApmError::NotSupported`]; only the Node
    /// source overrides this.
    fn set(&self, prop: &str, value: ConfigValue) -> Result<()> {
        let _ = (prop, value);
        Err(ApmError::NotSupported(format!(
            "the {} configuration source is read-only",
            self.name()
        )))
    }
}

// ── Env ───────────────────────────────────────────────────────────────────────

/// Derive the environment variable name for a property:
/// camelCase → `SCOUT_UPPER_SNAKE` (consecutive capitals stay joined, so
/// `revisionSHA` → `SCOUT_REVISION_SHA`).
#[must_use]
pub fn env_key(prop: &str) -> String {
    let mut out = String::with_capacity(prop.len() + 8);
    out.push_str("SCOUT_");
    let mut prev_lower = false;
    for ch in prop.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_uppercase());
    }
    out
}

/// Process-environment source with per-property parsers.
#[derive(Debug, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    fn get(&self, prop: &str) -> Option<ConfigValue> {
        let raw = env::var(env_key(prop)).ok()?;

        if BOOL_PROPS.contains(&prop) {
            return Some(ConfigValue::Bool(raw.eq_ignore_ascii_case("true")));
        }
        if LIST_PROPS.contains(&prop) {
            return Some(ConfigValue::List(
                raw.split(',').map(str::to_owned).collect(),
            ));
        }
        if INT_PROPS.contains(&prop) {
            return match raw.parse::<u64>() {
                Ok(n) => Some(ConfigValue::Int(n)),
                Err(_) => {
                    warn!(prop, value = %raw, "ignoring non-integer environment value");
                    None
                }
            };
        }
        if LEVEL_PROPS.contains(&prop) {
            return match LogLevel::parse(&raw) {
                Some(level) => Some(ConfigValue::Str(level.as_str().to_owned())),
                None => {
                    warn!(prop, value = %raw, "ignoring unrecognized log level");
                    None
                }
            };
        }

        Some(ConfigValue::Str(raw))
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// Values supplied by the embedding program. The only writable source.
#[derive(Debug, Default)]
pub struct NodeSource {
    values: Mutex<HashMap<String, ConfigValue>>,
}

impl ConfigSource for NodeSource {
    fn name(&self) -> &'static str {
        "node"
    }

    fn get(&self, prop: &str) -> Option<ConfigValue> {
        self.values
            .lock()
            .ok()
            .and_then(|map| map.get(prop).cloned())
    }

    fn set(&self, prop: &str, value: ConfigValue) -> Result<()> {
        self.values
            .lock()
            .map_err(|_| ApmError::NotSupported("node source lock poisoned".into()))?
            .insert(prop.to_owned(), value);
        Ok(())
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// URL prefix the core-agent tarballs are published under.
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://s3-us-west-1.amazonaws.com/scout-public-downloads/apm_core_agent/release";

/// Core-agent version launched when none is configured.
pub const DEFAULT_CORE_AGENT_VERSION: &str = "v1.2.7";

/// Directory the core-agent binary is cached and run from.
pub const DEFAULT_CORE_AGENT_DIR: &str = "/tmp/scout_apm_core";

/// Static defaults, queried last.
#[derive(Debug, Default)]
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
    fn name(&self) -> &'static str {
        "default"
    }

    fn get(&self, prop: &str) -> Option<ConfigValue> {
        match prop {
            "name" | "key" | "applicationRoot" | "framework" | "frameworkVersion"
            | "appServer" | "environment" => Some(ConfigValue::Str(String::new())),
            "revisionSHA" => Some(ConfigValue::Str(
                env::var("HEROKU_SLUG_COMMIT").unwrap_or_default(),
            )),
            "logLevel" | "coreAgentLogLevel" => Some(ConfigValue::Str("info".to_owned())),
            "monitor" => Some(ConfigValue::Bool(false)),
            "allowShutdown" => Some(ConfigValue::Bool(false)),
            "collectRemoteIP" => Some(ConfigValue::Bool(true)),
            "coreAgentDownload" | "coreAgentLaunch" => Some(ConfigValue::Bool(true)),
            "coreAgentPermissions" => Some(ConfigValue::Int(700)),
            "coreAgentVersion" => Some(ConfigValue::Str(DEFAULT_CORE_AGENT_VERSION.to_owned())),
            "coreAgentDir" => Some(ConfigValue::Str(DEFAULT_CORE_AGENT_DIR.to_owned())),
            "downloadUrl" => Some(ConfigValue::Str(DEFAULT_DOWNLOAD_URL.to_owned())),
            "apiVersion" => Some(ConfigValue::Str("1.0".to_owned())),
            "uriReporting" => Some(ConfigValue::Str("filtered-params".to_owned())),
            "ignore" | "disabledInstruments" => Some(ConfigValue::List(Vec::new())),
            "hostname" => Some(ConfigValue::Str(
                sysinfo::System::host_name().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
