//! Unit tests for the layered configuration resolver: source precedence,
//! environment parsing, derived composites, and defaults.

use std::sync::{Mutex, MutexGuard};

use scout_apm::config::{Config, ConfigSource, ConfigValue, EnvSource, UriReportingLevel};
use scout_apm::platform;
use scout_apm::ApmError;

/// Resolver tests serialize through this lock: some of them mutate the
/// process environment, which every resolver read observes.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ── Defaults ─────────────────────────────────────────────────────────────────

#[test]
fn defaults_match_the_static_table() {
    let _guard = env_guard();
    let config = Config::new();

    assert_eq!(
        config.get("coreAgentVersion"),
        Some(ConfigValue::Str("v1.2.7".to_owned()))
    );
    assert_eq!(config.get("monitor"), Some(ConfigValue::Bool(false)));
    assert_eq!(
        config.get("coreAgentDownload"),
        Some(ConfigValue::Bool(true))
    );
    assert_eq!(config.get("coreAgentLaunch"), Some(ConfigValue::Bool(true)));
    assert_eq!(
        config.get("downloadUrl").map(ConfigValue::into_string),
        Some(
            "https://s3-us-west-1.amazonaws.com/scout-public-downloads/apm_core_agent/release"
                .to_owned()
        )
    );
    assert_eq!(config.uri_reporting(), UriReportingLevel::FilteredParams);
}

#[test]
fn permission_digits_are_read_as_octal() {
    let _guard = env_guard();
    let config = Config::new();
    assert_eq!(config.core_agent_permissions(), 0o700);

    config.set("coreAgentPermissions", 755u64).expect("set");
    assert_eq!(config.core_agent_permissions(), 0o755);
}

// ── Precedence ───────────────────────────────────────────────────────────────

#[test]
fn env_beats_node_beats_default() {
    let _guard = env_guard();
    std::env::set_var("SCOUT_CORE_AGENT_VERSION", "v2.0.0");

    let config = Config::new();
    config.set("coreAgentVersion", "v1.9.0").expect("set");
    assert_eq!(
        config.get("coreAgentVersion").map(ConfigValue::into_string),
        Some("v2.0.0".to_owned()),
        "env must win over node"
    );

    std::env::remove_var("SCOUT_CORE_AGENT_VERSION");
    assert_eq!(
        config.get("coreAgentVersion").map(ConfigValue::into_string),
        Some("v1.9.0".to_owned()),
        "node must win over default once the env var is gone"
    );
}

#[test]
fn set_writes_the_node_source() {
    let _guard = env_guard();
    let config = Config::new();
    config.set("monitor", true).expect("set must succeed");
    assert!(config.monitor());
}

#[test]
fn read_only_sources_reject_writes() {
    let env = EnvSource;
    let err = env
        .set("monitor", ConfigValue::Bool(true))
        .expect_err("env source must be read-only");
    assert!(matches!(err, ApmError::NotSupported(_)), "got: {err:?}");
}

#[test]
fn unknown_props_resolve_to_absent() {
    let _guard = env_guard();
    let config = Config::new();
    assert_eq!(config.get("noSuchProperty"), None);
    assert_eq!(config.get("logFilePath"), None, "no default is defined");
}

// ── Environment parsing ──────────────────────────────────────────────────────

#[test]
fn boolean_env_values_require_literal_true() {
    let _guard = env_guard();
    let config = Config::new();

    std::env::set_var("SCOUT_MONITOR", "TRUE");
    assert!(config.monitor(), "case-insensitive true must parse");

    std::env::set_var("SCOUT_MONITOR", "1");
    assert!(!config.monitor(), "anything but \"true\" is false");

    std::env::remove_var("SCOUT_MONITOR");
}

#[test]
fn list_env_values_split_on_commas_without_trimming() {
    let _guard = env_guard();
    let config = Config::new();

    std::env::set_var("SCOUT_IGNORE", "/health, /admin");
    assert_eq!(
        config.ignore(),
        vec!["/health".to_owned(), " /admin".to_owned()],
        "whitespace must be preserved"
    );

    std::env::remove_var("SCOUT_IGNORE");
}

#[test]
fn unparsable_env_integers_fall_through() {
    let _guard = env_guard();
    let config = Config::new();

    std::env::set_var("SCOUT_CORE_AGENT_PERMISSIONS", "rwx");
    assert_eq!(
        config.core_agent_permissions(),
        0o700,
        "garbage must fall through to the default"
    );

    std::env::remove_var("SCOUT_CORE_AGENT_PERMISSIONS");
}

#[test]
fn unrecognized_log_levels_fall_through() {
    let _guard = env_guard();
    let config = Config::new();

    std::env::set_var("SCOUT_LOG_LEVEL", "chatty");
    assert_eq!(config.log_level().as_str(), "info");

    std::env::set_var("SCOUT_LOG_LEVEL", "DEBUG");
    assert_eq!(config.log_level().as_str(), "debug");

    std::env::remove_var("SCOUT_LOG_LEVEL");
}

// ── Derived composites ───────────────────────────────────────────────────────

#[test]
fn full_name_combines_version_and_triple() {
    let _guard = env_guard();
    let config = Config::new();
    config.set("coreAgentVersion", "v1.4.0").expect("set");

    let expected = format!("scout_apm_core-v1.4.0-{}", platform::detect_triple());
    assert_eq!(config.core_agent_full_name(), expected);
}

#[test]
fn full_name_strips_redundant_version_prefix() {
    let _guard = env_guard();
    let config = Config::new();
    config.set("coreAgentVersion", "1.4.0").expect("set");
    assert!(
        config.core_agent_full_name().starts_with("scout_apm_core-v1.4.0-"),
        "exactly one v prefix, got: {}",
        config.core_agent_full_name()
    );
}

#[test]
fn socket_path_derives_from_dir_and_full_name() {
    let _guard = env_guard();
    let config = Config::new();
    config.set("coreAgentDir", "/opt/scout").expect("set");
    config.set("coreAgentVersion", "v1.2.7").expect("set");

    let expected = format!(
        "/opt/scout/scout_apm_core-v1.2.7-{}/core-agent.sock",
        platform::detect_triple()
    );
    assert_eq!(config.socket_path(), expected);
}

#[test]
fn explicit_socket_path_wins_over_derivation() {
    let _guard = env_guard();
    let config = Config::new();
    config.set("socketPath", "/tmp/custom.sock").expect("set");
    assert_eq!(config.socket_path(), "/tmp/custom.sock");
    assert!(
        config.get_override("socketPath").is_some(),
        "override lookup must see the node value"
    );
}

#[test]
fn derived_values_are_absent_from_override_lookup() {
    let _guard = env_guard();
    let config = Config::new();
    assert_eq!(
        config.get_override("socketPath"),
        None,
        "a purely derived socket path is not an override"
    );
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

#[test]
fn snapshot_materializes_known_props() {
    let _guard = env_guard();
    let config = Config::new();
    let snapshot = config.snapshot();

    assert!(snapshot.contains_key("coreAgentVersion"));
    assert!(snapshot.contains_key("coreAgentTriple"));
    assert!(snapshot.contains_key("socketPath"));
    assert!(snapshot.contains_key("monitor"));
    assert!(
        !snapshot.contains_key("logFilePath"),
        "absent props must not appear in the snapshot"
    );
}

#[test]
fn disabled_instruments_lookup() {
    let _guard = env_guard();
    let config = Config::new();
    config
        .set("disabledInstruments", vec!["HttpClient".to_owned()])
        .expect("set");
    assert!(config.instrument_is_disabled("HttpClient"));
    assert!(!config.instrument_is_disabled("Sql"));
}
