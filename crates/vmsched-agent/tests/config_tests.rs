//! Configuration loading and validation tests

use std::io::Write;

use vmsched_agent::config::ENV_PREFIX;
use vmsched_agent::Config;

fn toml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = toml_file(
        r#"
        [agent]
        log_level = "debug"
        stats_interval = 10

        [exchange]
        dir = "/var/run/vmsched"
        idle_delay_ms = 25
        max_request_failures = 3

        [policy]
        action_dim = 20
        epsilon = 0.1
        seed = 42
        "#,
    );

    let config = Config::load_from(Some(file.path()), "VMSCHED_TEST_FILE").unwrap();

    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.agent.stats_interval, 10);
    assert_eq!(config.exchange.dir.to_str(), Some("/var/run/vmsched"));
    assert_eq!(config.exchange.idle_delay_ms, 25);
    assert_eq!(config.exchange.max_request_failures, Some(3));
    assert_eq!(config.policy.action_dim, 20);
    assert_eq!(config.policy.seed, Some(42));
    // Unset keys keep their defaults
    assert_eq!(config.exchange.request_file, "state.json");
    assert_eq!(config.exchange.error_backoff_ms, 100);
    assert_eq!(config.policy.hidden_dim, 128);
}

#[test]
fn test_env_overrides_file() {
    let file = toml_file("[policy]\nepsilon = 0.5\n");
    std::env::set_var("VMSCHED_TEST_ENV__POLICY__EPSILON", "0.25");
    std::env::set_var("VMSCHED_TEST_ENV__EXCHANGE__ERROR_BACKOFF_MS", "250");

    let config = Config::load_from(Some(file.path()), "VMSCHED_TEST_ENV").unwrap();

    assert_eq!(config.policy.epsilon, 0.25);
    assert_eq!(config.exchange.error_backoff_ms, 250);
}

#[test]
fn test_defaults_without_file() {
    let config = Config::load_from(None, "VMSCHED_TEST_NONE").unwrap();
    assert_eq!(config.policy.action_dim, 5);
    assert_eq!(config.exchange.response_file, "action.json");
}

#[test]
fn test_invalid_file_values_rejected() {
    let file = toml_file("[policy]\nepsilon = 2.0\n");
    assert!(Config::load_from(Some(file.path()), "VMSCHED_TEST_BAD").is_err());

    let file = toml_file("[exchange]\nstaging_file = \"state.json\"\n");
    assert!(Config::load_from(Some(file.path()), "VMSCHED_TEST_BAD").is_err());
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(Config::load_from(Some(path.as_path()), "VMSCHED_TEST_MISSING").is_err());
}

#[test]
fn test_env_prefix_constant() {
    assert_eq!(ENV_PREFIX, "VMSCHED");
}
