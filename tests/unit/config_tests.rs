// Configuration loading and validation through the public API

use imgrelay::config::{Config, RoutingMode};
use imgrelay::error::ProxyError;
use imgrelay::format::ImageFormat;
use std::io::Write;

fn minimal_yaml() -> &'static str {
    r#"
routing:
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
"#
}

#[test]
fn test_minimal_config_is_valid_with_defaults() {
    let config = Config::from_yaml_with_env(minimal_yaml()).expect("Failed to deserialize YAML");
    config.validate().expect("minimal config must validate");
    assert_eq!(config.server.address, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.routing.mode, RoutingMode::Proxy);
    assert_eq!(
        config.routing.supported_formats,
        vec![ImageFormat::Avif, ImageFormat::Webp]
    );
}

#[test]
fn test_config_loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(minimal_yaml().as_bytes())
        .expect("Failed to write temp config");

    let config = Config::from_file(file.path()).expect("Failed to load config from file");
    assert_eq!(config.routing.target_domain, "https://images.example.com");
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let err = Config::from_file("/nonexistent/imgrelay.yaml").unwrap_err();
    assert!(matches!(err, ProxyError::Config(_)));
}

#[test]
fn test_full_config_round_trip() {
    let yaml = r#"
server:
  address: "127.0.0.1"
  port: 9090
  threads: 8
routing:
  mode: redirect
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
  api_key: "sekrit"
  supported_formats: [webp, avif]
  cache_max_age_seconds: 3600
  redirect_status_code: 301
  timeout: 5
"#;
    let config = Config::from_yaml_with_env(yaml).expect("Failed to deserialize YAML");
    config.validate().expect("full config must validate");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.routing.mode, RoutingMode::Redirect);
    assert!(config.routing.has_api_key());
    // The declared order is the negotiation priority order
    assert_eq!(
        config.routing.supported_formats,
        vec![ImageFormat::Webp, ImageFormat::Avif]
    );
    assert_eq!(config.routing.cache_max_age_seconds, 3600);
    assert_eq!(config.routing.redirect_status_code, 301);
    assert_eq!(config.routing.timeout, 5);
}

#[test]
fn test_env_substitution_in_file_config() {
    std::env::set_var("IMGRELAY_FILE_TEST_KEY", "from-env");
    let yaml = r#"
routing:
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
  api_key: "${IMGRELAY_FILE_TEST_KEY}"
"#;
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(yaml.as_bytes())
        .expect("Failed to write temp config");

    let config = Config::from_file(file.path()).expect("Failed to load config from file");
    assert_eq!(config.routing.api_key, "from-env");
}

#[test]
fn test_unset_env_var_fails_before_deserialization() {
    let yaml = r#"
routing:
  target_domain: "${IMGRELAY_DEFINITELY_UNSET_VAR}"
  converter_base_url: "https://optimizer.example.com"
"#;
    let err = Config::from_yaml_with_env(yaml).unwrap_err();
    assert!(matches!(err, ProxyError::Config(_)));
    assert!(err.to_string().contains("IMGRELAY_DEFINITELY_UNSET_VAR"));
}

#[test]
fn test_misconfigured_deployment_is_detectable_without_network() {
    // Both base URLs empty: the exact state a deployment with missing
    // environment bindings ends up in. Must surface as a config error.
    let yaml = r#"
routing:
  target_domain: ""
  converter_base_url: ""
"#;
    let config = Config::from_yaml_with_env(yaml).expect("Failed to deserialize YAML");
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ProxyError::Config(_)));
}

#[test]
fn test_zero_threads_rejected() {
    let yaml = r#"
server:
  threads: 0
routing:
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
"#;
    let config = Config::from_yaml_with_env(yaml).expect("Failed to deserialize YAML");
    assert!(config.validate().is_err());
}

#[test]
fn test_unknown_format_rejected_at_parse_time() {
    let yaml = r#"
routing:
  target_domain: "https://images.example.com"
  converter_base_url: "https://optimizer.example.com"
  supported_formats: [jpegxl]
"#;
    assert!(Config::from_yaml_with_env(yaml).is_err());
}
