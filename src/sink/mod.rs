pub mod batch;
pub mod error;
pub mod registry;
pub mod report;
pub mod worker;

pub use batch::{Batch, BatchLimits, PendingBatch};
pub use error::{DeliveryError, SinkError};
pub use registry::SinkRegistry;
pub use report::{ErrorReporter, TracingReporter};
pub use worker::Sink;
