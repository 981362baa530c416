//! Headless client for the HTTP surface, with single-flight token refresh.

mod api_client;
mod refresh_coordinator;

pub use api_client::*;
pub use refresh_coordinator::*;
