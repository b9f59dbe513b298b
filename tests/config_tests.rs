use logdrain::config::generate::generate_starter_config;
use logdrain::config::parse::load_config_unvalidated;
use logdrain::config::{load_config, validate_config, ConfigError, Overrides, StoreConfig};
use logdrain::source::MessageFormat;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
server:
  bind: 127.0.0.1:9090
  username: drain
  password: hunter2
  strip_ansi_codes: true
  message_format: json
  shutdown_grace: 2s

sink:
  retention_days: 14
  flush_interval: 500ms
  max_batch_events: 500
  queue_capacity: 64
  drain_timeout: infinite

store:
  type: http
  endpoint: https://logs.example.internal
  timeout: 3s
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.server.bind, "127.0.0.1:9090");
    assert_eq!(config.server.username, "drain");
    assert!(config.server.strip_ansi_codes);
    assert_eq!(config.server.message_format, MessageFormat::Json);
    assert_eq!(config.server.shutdown_grace, Duration::from_secs(2));
    assert_eq!(config.sink.retention_days, 14);
    assert_eq!(config.sink.flush_interval, Duration::from_millis(500));
    assert_eq!(config.sink.max_batch_events, 500);
    assert_eq!(config.sink.queue_capacity, 64);
    assert_eq!(config.sink.drain_timeout, None);
    assert_eq!(
        config.store,
        StoreConfig::Http {
            endpoint: "https://logs.example.internal".to_string(),
            timeout: Duration::from_secs(3),
        }
    );
}

#[test]
fn test_env_vars_are_expanded() {
    std::env::set_var("LOGDRAIN_CFG_TEST_PASSWORD", "from-env");
    let file = write_config("server:\n  password: $env{LOGDRAIN_CFG_TEST_PASSWORD}\n");

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.server.password, "from-env");

    std::env::remove_var("LOGDRAIN_CFG_TEST_PASSWORD");
}

#[test]
fn test_unset_env_var_is_reported() {
    let file = write_config("server:\n  password: $env{LOGDRAIN_CFG_TEST_UNSET}\n");

    match load_config(file.path()) {
        Err(ConfigError::Validation(msg)) => assert!(msg.contains("LOGDRAIN_CFG_TEST_UNSET")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_are_listed() {
    let file = write_config(
        r#"
server:
  bind: nowhere
sink:
  retention_days: 10
  queue_capacity: 0
"#,
    );

    match load_config(file.path()) {
        Err(ConfigError::ValidationList(errors)) => {
            assert_eq!(errors.len(), 3, "{:?}", errors);
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[test]
fn test_overrides_fix_invalid_file_values() {
    let file = write_config("server:\n  bind: nowhere\n");

    let mut config = load_config_unvalidated(file.path()).unwrap();
    assert!(validate_config(&config).is_err());

    Overrides {
        bind: Some("0.0.0.0:7000".to_string()),
        ..Overrides::default()
    }
    .apply_to(&mut config);
    validate_config(&config).unwrap();
}

#[test]
fn test_bare_port_bind_is_valid() {
    let file = write_config("server:\n  bind: \":9090\"\n");

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.server.bind, ":9090");
    assert_eq!(config.server.socket_addr(), "0.0.0.0:9090".parse().ok());
}

#[test]
fn test_missing_file() {
    let result = load_config(std::path::Path::new("/nonexistent/logdrain.yml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_starter_config_loads() {
    let file = write_config(&generate_starter_config());
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.store, StoreConfig::default());
}
