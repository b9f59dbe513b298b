pub mod http;
pub mod memory;
pub mod sigv4;
pub mod traits;

pub use http::HttpLogStore;
pub use memory::{MemoryLogStore, StoreCall};
pub use sigv4::{AwsCredentials, Signer};
pub use traits::{Destination, InputLogEvent, LogStore, SequenceToken, StoreError};
