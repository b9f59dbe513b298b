use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque value returned by the store after an append. The next append to the
/// same stream must present it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceToken(String);

impl SequenceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One event as the store receives it: milliseconds since the epoch and the
/// message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLogEvent {
    pub timestamp: i64,
    pub message: String,
}

/// Addressable unit for appends: a log group and one stream inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub group: String,
    pub stream: String,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.stream)
    }
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append events (already sorted by timestamp) and return the token for the
    /// next append.
    async fn put_log_events(
        &self,
        destination: &Destination,
        token: Option<&SequenceToken>,
        events: &[InputLogEvent],
    ) -> Result<Option<SequenceToken>, StoreError>;

    async fn create_log_stream(&self, destination: &Destination) -> Result<(), StoreError>;

    async fn create_log_group(&self, group: &str) -> Result<(), StoreError>;

    async fn put_retention_policy(&self, group: &str, days: u32) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("invalid sequence token: {message}")]
    InvalidSequenceToken {
        message: String,
        expected: Option<SequenceToken>,
    },

    #[error("data already accepted: {message}")]
    DataAlreadyAccepted {
        message: String,
        expected: Option<SequenceToken>,
    },

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("{code}: {message}")]
    Service { code: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// The group or stream addressed by the call does not exist.
    pub fn is_resource_missing(&self) -> bool {
        matches!(self, StoreError::ResourceNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::ResourceAlreadyExists(_))
    }

    /// Token the store expects on the next append, when the error carries one.
    /// `Some(None)` means the stream expects no token at all.
    pub fn corrected_token(&self) -> Option<Option<SequenceToken>> {
        match self {
            StoreError::InvalidSequenceToken { expected, .. }
            | StoreError::DataAlreadyAccepted { expected, .. } => Some(expected.clone()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}
