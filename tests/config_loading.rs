//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use bitfinex_stream::bin_common::{load_config_from_env, ConfigType};
use bitfinex_stream::bitfinex::SessionConfig;
use std::env;

#[test]
fn test_session_config_default_path() {
    // Clear env var to test default
    env::remove_var("SESSION_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Session);
    assert_eq!(config_path.to_str().unwrap(), "config/session_config.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_session_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/session_config.yaml");
    let config = SessionConfig::load(path).expect("shipped config should load");

    assert_eq!(config.heartbeat_interval_secs, 5);
    assert_eq!(config.staleness_threshold_secs, 30);
    assert_eq!(config.required_ready_events(), 4);
}
