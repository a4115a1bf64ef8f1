//! Unit tests for application metadata capture and serialization.

use scout_apm::{ApplicationMetadata, Config};

#[test]
fn capture_reflects_configuration() {
    let config = Config::new();
    config.set("name", "demo-app").expect("set");
    config.set("framework", "axum").expect("set");
    config.set("frameworkVersion", "0.7").expect("set");
    config.set("environment", "production").expect("set");
    config.set("revisionSHA", "abc123").expect("set");

    let meta = ApplicationMetadata::capture(&config);
    assert_eq!(meta.language, "rust");
    assert_eq!(meta.application_name, "demo-app");
    assert_eq!(meta.framework, "axum");
    assert_eq!(meta.framework_version, "0.7");
    assert_eq!(meta.environment, "production");
    assert_eq!(meta.git_sha, "abc123");
}

#[test]
fn event_value_is_a_key_value_map() {
    let config = Config::new();
    config.set("name", "demo-app").expect("set");

    let meta = ApplicationMetadata::capture(&config);
    let value = meta.to_event_value().expect("serialization must succeed");
    let obj = value.as_object().expect("metadata must serialize to a map");

    assert_eq!(obj["language"], "rust");
    assert_eq!(obj["application_name"], "demo-app");
    assert!(obj.contains_key("server_time"));
    assert!(obj.contains_key("libraries"));
    assert!(obj.contains_key("git_sha"));
}
