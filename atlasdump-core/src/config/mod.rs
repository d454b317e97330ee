//! Configuration types for the connection and export layers.
//!
//! - `ConnectionConfig`: client options applied to every short-lived client
//! - `ExportConfig`: bounds and discovery behaviour for the export path
//!
//! # Security
//! Neither struct stores credentials. Credentials arrive with each request
//! inside the connection string and live only in [`crate::ConnectionSpec`].

mod connection;
mod export;

pub use connection::ConnectionConfig;
pub use export::{DEFAULT_PROBE_COLLECTIONS, ExportConfig};
