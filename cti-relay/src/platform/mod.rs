//! Platform API.
//!
//! Registration, connector pings (which also persist the checkpoint) and the
//! work-tracking mutations, all over GraphQL with a bearer token.

mod client;
mod models;

pub use client::{PlatformClient, install_rustls_provider};
pub use models::ConnectorConfiguration;
