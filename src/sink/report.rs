use crate::sink::error::DeliveryError;
use tracing::error;

/// Receives delivery failures that happen after the submitting request has
/// already returned.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, tenant: &str, error: &DeliveryError);
}

/// Logs every failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, tenant: &str, error: &DeliveryError) {
        error!(tenant = %tenant, class = error.class(), error = %error, "Log delivery failed");
    }
}
