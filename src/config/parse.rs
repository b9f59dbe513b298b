use super::types::*;
use crate::config::{env_var_regex, expand_env_vars};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Retention periods the store accepts, in days
pub const RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// Hard limits the store puts on a single append
pub const STORE_MAX_BATCH_BYTES: usize = 1_048_576;
pub const STORE_MAX_BATCH_EVENTS: usize = 10_000;

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = load_config_unvalidated(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load a config file without validating it, so command-line overrides can be
/// applied before validation.
pub fn load_config_unvalidated(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse config YAML after expanding `$env{VAR}` references.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;
    Ok(serde_yaml::from_str(&yaml_string)?)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_regex()
        .captures_iter(yaml_string)
        .map(|cap| cap[1].to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Check every section and report all problems at once.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_server(&config.server, &mut errors);
    validate_sink(&config.sink, &mut errors);
    validate_store(&config.store, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_server(server: &ServerConfig, errors: &mut Vec<String>) {
    if server.socket_addr().is_none() {
        errors.push(format!(
            "server.bind: '{}' is not a valid socket address (expected host:port or :port)",
            server.bind
        ));
    }
}

fn validate_sink(sink: &SinkConfig, errors: &mut Vec<String>) {
    if sink.retention_days != 0 && !RETENTION_DAYS.contains(&sink.retention_days) {
        errors.push(format!(
            "sink.retention_days: {} is not a supported retention period (use 0 or one of {:?})",
            sink.retention_days, RETENTION_DAYS
        ));
    }

    if sink.flush_interval.is_zero() {
        errors.push("sink.flush_interval must be greater than zero".to_string());
    }

    if sink.max_batch_events == 0 || sink.max_batch_events > STORE_MAX_BATCH_EVENTS {
        errors.push(format!(
            "sink.max_batch_events must be between 1 and {}",
            STORE_MAX_BATCH_EVENTS
        ));
    }

    if sink.max_batch_bytes == 0 || sink.max_batch_bytes > STORE_MAX_BATCH_BYTES {
        errors.push(format!(
            "sink.max_batch_bytes must be between 1 and {}",
            STORE_MAX_BATCH_BYTES
        ));
    }

    if sink.max_event_bytes == 0 {
        errors.push("sink.max_event_bytes must be greater than zero".to_string());
    } else if sink.max_event_bytes + sink.event_overhead > sink.max_batch_bytes {
        errors.push(format!(
            "sink.max_event_bytes ({}) plus event_overhead ({}) exceeds max_batch_bytes ({})",
            sink.max_event_bytes, sink.event_overhead, sink.max_batch_bytes
        ));
    }

    if sink.queue_capacity == 0 {
        errors.push("sink.queue_capacity must be greater than zero".to_string());
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    match store {
        StoreConfig::Memory { retain_events } => {
            if *retain_events == 0 {
                errors.push("store.retain_events must be greater than zero".to_string());
            }
        }
        StoreConfig::Http { endpoint, .. } => validate_endpoint(endpoint, errors),
        StoreConfig::Cloudwatch {
            region,
            endpoint,
            access_key_id,
            secret_access_key,
            ..
        } => {
            if region.trim().is_empty() {
                errors.push("store.region cannot be empty".to_string());
            }
            if let Some(endpoint) = endpoint {
                validate_endpoint(endpoint, errors);
            }
            if access_key_id.is_some() != secret_access_key.is_some() {
                errors.push(
                    "store.access_key_id and store.secret_access_key must be set together"
                        .to_string(),
                );
            }
        }
    }
}

fn validate_endpoint(endpoint: &str, errors: &mut Vec<String>) {
    if endpoint.trim().is_empty() {
        errors.push("store.endpoint cannot be empty".to_string());
    } else if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        errors.push(format!(
            "store.endpoint: '{}' must start with http:// or https://",
            endpoint
        ));
    }
}
