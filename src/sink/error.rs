use crate::store::StoreError;
use thiserror::Error;

/// Why a flush did not reach the store.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("PutLogEvents failed: {0}")]
    Append(#[source] StoreError),

    #[error("{operation} failed: {source}")]
    Provision {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl DeliveryError {
    /// Name of the remote operation that failed; used to group reports.
    pub fn class(&self) -> &'static str {
        match self {
            DeliveryError::Append(_) => "PutLogEvents",
            DeliveryError::Provision { operation, .. } => *operation,
        }
    }

    /// Provisioning failures are treated as persistent: the batch is dropped.
    pub fn is_provisioning(&self) -> bool {
        matches!(self, DeliveryError::Provision { .. })
    }

    pub fn store_error(&self) -> &StoreError {
        match self {
            DeliveryError::Append(source) | DeliveryError::Provision { source, .. } => source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink for '{0}' is stopped")]
    Stopped(String),

    #[error("sink registry is shut down")]
    RegistryClosed,

    #[error("timed out draining sinks for: {}", .tenants.join(", "))]
    DrainTimeout { tenants: Vec<String> },
}
