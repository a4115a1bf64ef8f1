//! Layered configuration resolver.
//!
//! Four sources are queried in fixed precedence order — **Env** (process
//! environment, `SCOUT_*` variables), **Node** (values supplied by the
//! embedding program; the only writable source), **Derived** (composites
//! computed from other properties through the same resolver), **Default**
//! (static table). `get` returns the first source that yields a value.
//!
//! Derived rules:
//!
//! | Property            | Derivation                                            |
//! |---------------------|-------------------------------------------------------|
//! | `coreAgentTriple`   | `{arch}-{platform}` from the platform detector        |
//! | `coreAgentFullName` | `scout_apm_core-v{version}-{triple}`                  |
//! | `socketPath`        | `{coreAgentDir}/{coreAgentFullName}/core-agent.sock`  |

pub mod source;
pub mod value;

use std::collections::HashMap;

use tracing::warn;

use crate::errors::Result;
use crate::platform;
use crate::version::CoreAgentVersion;

pub use source::{ConfigSource, DefaultsSource, EnvSource, NodeSource};
pub use value::{ConfigValue, LogLevel, UriReportingLevel};

/// Every property the resolver knows about, in snapshot order.
pub const KNOWN_PROPS: &[&str] = &[
    "name",
    "key",
    "revisionSHA",
    "applicationRoot",
    "logLevel",
    "logFilePath",
    "socketPath",
    "allowShutdown",
    "monitor",
    "framework",
    "frameworkVersion",
    "appServer",
    "environment",
    "apiVersion",
    "downloadUrl",
    "coreAgentDownload",
    "coreAgentLaunch",
    "coreAgentDir",
    "coreAgentLogLevel",
    "coreAgentPermissions",
    "coreAgentVersion",
    "coreAgentTriple",
    "coreAgentFullName",
    "hostname",
    "ignore",
    "collectRemoteIP",
    "uriReporting",
    "disabledInstruments",
];

/// Derived lookups recurse through the resolver; two levels suffice for the
/// rules above, the cap guards against future cycles.
const MAX_DERIVATION_DEPTH: usize = 4;

/// The layered configuration record.
///
/// Cheap to share behind an `Arc`; reads take no lock except on the Node
/// source's map.
#[derive(Debug, Default)]
pub struct Config {
    env: EnvSource,
    node: NodeSource,
    defaults: DefaultsSource,
}

impl Config {
    /// An empty resolver: environment, derivations, and defaults only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver seeded with embedder-supplied values.
    #[must_use]
    pub fn from_pairs<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<ConfigValue>,
    {
        let config = Self::new();
        for (prop, value) in pairs {
            // NodeSource::set only fails on lock poisoning.
            let _ = config.node.set(prop, value.into());
        }
        config
    }

    /// Resolve `prop` through the source chain.
    #[must_use]
    pub fn get(&self, prop: &str) -> Option<ConfigValue> {
        self.lookup(prop, 0)
    }

    /// Resolve `prop` from the override sources only (Env, Node), skipping
    /// derivation and defaults. Used where an explicitly configured value
    /// must be distinguished from a derived one.
    #[must_use]
    pub fn get_override(&self, prop: &str) -> Option<ConfigValue> {
        self.env.get(prop).or_else(|| self.node.get(prop))
    }

    /// Write `value` for `prop` into the Node source.
    ///
    /// # Errors
    ///
    /// Returns [`NotSupported`](crate::ApmError::NotSupported) only when the
    /// Node store is unusable; individual read-only sources reject writes
    /// with the same error through [`ConfigSource::set`].
    pub fn set(&self, prop: &str, value: impl Into<ConfigValue>) -> Result<()> {
        self.node.set(prop, value.into())
    }

    /// Materialize every known property.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ConfigValue> {
        KNOWN_PROPS
            .iter()
            .filter_map(|prop| self.get(prop).map(|v| ((*prop).to_owned(), v)))
            .collect()
    }

    fn lookup(&self, prop: &str, depth: usize) -> Option<ConfigValue> {
        if depth > MAX_DERIVATION_DEPTH {
            warn!(prop, "configuration derivation exceeded depth cap");
            return None;
        }
        self.env
            .get(prop)
            .or_else(|| self.node.get(prop))
            .or_else(|| self.derive(prop, depth))
            .or_else(|| self.defaults.get(prop))
    }

    /// The Derived source: composites computed via recursive lookup.
    fn derive(&self, prop: &str, depth: usize) -> Option<ConfigValue> {
        match prop {
            "coreAgentTriple" => Some(ConfigValue::Str(platform::detect_triple())),
            "coreAgentFullName" => {
                let version = self.lookup("coreAgentVersion", depth + 1)?.into_string();
                let triple = self.lookup("coreAgentTriple", depth + 1)?.into_string();
                if !platform::is_valid_triple(&triple) {
                    warn!(triple = %triple, "core agent triple is not a published build");
                }
                let numeric = CoreAgentVersion::parse(&version).numeric();
                Some(ConfigValue::Str(format!(
                    "scout_apm_core-v{numeric}-{triple}"
                )))
            }
            "socketPath" => {
                let dir = self.lookup("coreAgentDir", depth + 1)?.into_string();
                let full_name = self.lookup("coreAgentFullName", depth + 1)?.into_string();
                Some(ConfigValue::Str(format!("{dir}/{full_name}/core-agent.sock")))
            }
            _ => None,
        }
    }

    // ── Typed accessors ──────────────────────────────────────────────────────

    fn str_prop(&self, prop: &str) -> String {
        self.get(prop).map(ConfigValue::into_string).unwrap_or_default()
    }

    fn bool_prop(&self, prop: &str) -> bool {
        self.get(prop).is_some_and(|v| v.as_bool())
    }

    /// Application name, as registered with the agent.
    #[must_use]
    pub fn name(&self) -> String {
        self.str_prop("name")
    }

    /// Organization key, as registered with the agent.
    #[must_use]
    pub fn key(&self) -> String {
        self.str_prop("key")
    }

    /// Deployed revision SHA (`HEROKU_SLUG_COMMIT` fallback).
    #[must_use]
    pub fn revision_sha(&self) -> String {
        self.str_prop("revisionSHA")
    }

    /// Application root directory, if configured.
    #[must_use]
    pub fn application_root(&self) -> String {
        self.str_prop("applicationRoot")
    }

    /// Hostname reported in application metadata.
    #[must_use]
    pub fn hostname(&self) -> String {
        self.str_prop("hostname")
    }

    /// Framework name reported in application metadata.
    #[must_use]
    pub fn framework(&self) -> String {
        self.str_prop("framework")
    }

    /// Framework version reported in application metadata.
    #[must_use]
    pub fn framework_version(&self) -> String {
        self.str_prop("frameworkVersion")
    }

    /// App-server name reported in application metadata.
    #[must_use]
    pub fn app_server(&self) -> String {
        self.str_prop("appServer")
    }

    /// Deployment environment reported in application metadata.
    #[must_use]
    pub fn environment(&self) -> String {
        self.str_prop("environment")
    }

    /// Whether telemetry is shipped at all.
    #[must_use]
    pub fn monitor(&self) -> bool {
        self.bool_prop("monitor")
    }

    /// Whether `shutdown` may stop the agent process.
    #[must_use]
    pub fn allow_shutdown(&self) -> bool {
        self.bool_prop("allowShutdown")
    }

    /// Whether remote IPs are recorded by instrumentation plugins.
    #[must_use]
    pub fn collect_remote_ip(&self) -> bool {
        self.bool_prop("collectRemoteIP")
    }

    /// Whether the downloader may fetch a missing agent binary.
    #[must_use]
    pub fn core_agent_download(&self) -> bool {
        self.bool_prop("coreAgentDownload")
    }

    /// Whether setup launches the agent process (vs. attaching).
    #[must_use]
    pub fn core_agent_launch(&self) -> bool {
        self.bool_prop("coreAgentLaunch")
    }

    /// Runtime log level.
    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        self.get("logLevel")
            .and_then(|v| LogLevel::parse(&v.into_string()))
            .unwrap_or(LogLevel::Info)
    }

    /// Log level passed to the spawned core agent.
    #[must_use]
    pub fn core_agent_log_level(&self) -> LogLevel {
        self.get("coreAgentLogLevel")
            .and_then(|v| LogLevel::parse(&v.into_string()))
            .unwrap_or(LogLevel::Info)
    }

    /// Permission bits for the core-agent run directory.
    ///
    /// The configured integer is read as octal digits: `700` → `0o700`.
    #[must_use]
    pub fn core_agent_permissions(&self) -> u32 {
        self.get("coreAgentPermissions")
            .and_then(|v| v.as_int())
            .and_then(|n| u32::from_str_radix(&n.to_string(), 8).ok())
            .unwrap_or(0o700)
    }

    /// Configured core-agent version.
    #[must_use]
    pub fn core_agent_version(&self) -> CoreAgentVersion {
        CoreAgentVersion::parse(&self.str_prop("coreAgentVersion"))
    }

    /// Directory the agent binary is cached and run from.
    #[must_use]
    pub fn core_agent_dir(&self) -> String {
        self.str_prop("coreAgentDir")
    }

    /// Versioned agent directory name, e.g.
    /// `scout_apm_core-v1.2.7-x86_64-linux-gnu`.
    #[must_use]
    pub fn core_agent_full_name(&self) -> String {
        self.str_prop("coreAgentFullName")
    }

    /// Socket path: explicit if configured, derived otherwise.
    #[must_use]
    pub fn socket_path(&self) -> String {
        self.str_prop("socketPath")
    }

    /// Tarball download URL prefix.
    #[must_use]
    pub fn download_url(&self) -> String {
        self.str_prop("downloadUrl")
    }

    /// Agent API version sent with `Register`.
    #[must_use]
    pub fn api_version(&self) -> String {
        self.str_prop("apiVersion")
    }

    /// Ordered request-path prefixes that suppress tracing.
    #[must_use]
    pub fn ignore(&self) -> Vec<String> {
        self.get("ignore").map(|v| v.as_list()).unwrap_or_default()
    }

    /// Instruments the embedder has turned off.
    #[must_use]
    pub fn disabled_instruments(&self) -> Vec<String> {
        self.get("disabledInstruments")
            .map(|v| v.as_list())
            .unwrap_or_default()
    }

    /// Whether a named instrument is disabled.
    #[must_use]
    pub fn instrument_is_disabled(&self, instrument: &str) -> bool {
        self.disabled_instruments().iter().any(|i| i == instrument)
    }

    /// URL scrubbing policy.
    #[must_use]
    pub fn uri_reporting(&self) -> UriReportingLevel {
        self.get("uriReporting")
            .and_then(|v| UriReportingLevel::parse(&v.into_string()))
            .unwrap_or_default()
    }
}
