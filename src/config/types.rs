use crate::source::MessageFormat;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sink: SinkConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Basic-auth credentials. Both empty means requests without credentials
    /// are accepted.
    pub username: String,
    pub password: String,
    pub strip_ansi_codes: bool,
    pub message_format: MessageFormat,
    /// How long in-flight requests get to finish once shutdown starts
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            username: String::new(),
            password: String::new(),
            strip_ansi_codes: false,
            message_format: MessageFormat::Text,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Resolve `bind` to a socket address. A bare `:port` listens on every
    /// interface.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self.bind.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port).parse().ok(),
            None => self.bind.parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Retention applied to log groups this process creates. 0 leaves it unset.
    pub retention_days: u32,
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    pub max_batch_bytes: usize,
    pub max_batch_events: usize,
    /// Bytes the store accounts for each event on top of its message
    pub event_overhead: usize,
    /// Longest message kept per event; longer ones are truncated
    pub max_event_bytes: usize,
    /// Capacity of each sink's inbound queue. Submitters wait when it is full.
    pub queue_capacity: usize,
    #[serde(with = "duration_format")]
    pub drain_timeout: Option<Duration>,
}

pub const DEFAULT_MAX_BATCH_BYTES: usize = 1_048_576 - 1_024;
pub const DEFAULT_MAX_BATCH_EVENTS: usize = 10_000;
pub const DEFAULT_EVENT_OVERHEAD: usize = 26;
pub const DEFAULT_MAX_EVENT_BYTES: usize = 262_144 - DEFAULT_EVENT_OVERHEAD;

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            retention_days: 0,
            flush_interval: Duration::from_secs(1),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_batch_events: DEFAULT_MAX_BATCH_EVENTS,
            event_overhead: DEFAULT_EVENT_OVERHEAD,
            max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
            queue_capacity: 1024,
            drain_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Keep events in process memory. Nothing leaves the host, and only the
    /// newest `retain_events` of each stream are kept.
    Memory {
        #[serde(default = "default_retain_events")]
        retain_events: usize,
    },
    /// Unsigned JSON API endpoint, such as a signing proxy or an emulator.
    Http {
        endpoint: String,
        #[serde(default = "default_store_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
    /// CloudWatch Logs with signed requests. Keys left unset come from
    /// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
    Cloudwatch {
        region: String,
        /// Defaults to the regional endpoint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_key_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        secret_access_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_token: Option<String>,
        #[serde(default = "default_store_timeout", with = "humantime_serde")]
        timeout: Duration,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory {
            retain_events: default_retain_events(),
        }
    }
}

impl StoreConfig {
    /// Endpoint for a CloudWatch store: the configured one, or the service's
    /// regional endpoint.
    pub fn cloudwatch_endpoint(region: &str, endpoint: Option<&str>) -> String {
        match endpoint {
            Some(endpoint) => endpoint.to_string(),
            None => format!("https://logs.{}.amazonaws.com/", region),
        }
    }
}

pub const DEFAULT_RETAIN_EVENTS: usize = 10_000;

fn default_retain_events() -> usize {
    DEFAULT_RETAIN_EVENTS
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bind: Option<String>,
    pub retention_days: Option<u32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub strip_ansi_codes: bool,
}

impl Overrides {
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(days) = self.retention_days {
            config.sink.retention_days = days;
        }
        if let Some(username) = &self.username {
            config.server.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.server.password = password.clone();
        }
        if self.strip_ansi_codes {
            config.server.strip_ansi_codes = true;
        }
    }
}

// Durations that may also be "infinite"
mod duration_format {
    use humantime_serde::re::humantime;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_str("infinite"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.trim() == "infinite" {
            Ok(None)
        } else {
            humantime::parse_duration(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}
