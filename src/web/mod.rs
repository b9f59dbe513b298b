pub mod api;
pub mod auth;
pub mod server;

pub use api::DrainState;
pub use auth::Credentials;
pub use server::{router, run_server};
