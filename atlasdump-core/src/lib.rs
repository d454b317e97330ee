//! Core pipeline for exporting a MongoDB Atlas database to JSON.
//!
//! A caller hands over a raw connection string at request time. This crate
//! checks and repairs it, opens a short-lived client, discovers which
//! collections the credential can reach, and assembles a bounded export
//! document with per-collection error reporting.
//!
//! # Guarantees
//! - Read-only: nothing in this crate issues a write against the remote server
//! - Passwords never appear in logs, error messages, or export documents
//! - Every opened connection is closed exactly once, whatever the outcome
//! - Per-collection and statistics failures are reported inline, never escalated
//!
//! # Pipeline
//! raw string → [`connection_string`] → [`connection`] (open) →
//! [`discovery`] → [`export`] → [`models::ExportDocument`] → close.
//! [`validation`] is the fast sibling that stops after enumerating collections.

pub mod config;
pub mod connection;
pub mod connection_string;
pub mod discovery;
pub mod error;
pub mod export;
pub mod items;
pub mod logging;
pub mod models;
pub mod mongodb;
pub mod security;
pub mod service;
pub mod session;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export commonly used types
pub use config::{ConnectionConfig, ExportConfig};
pub use connection::{ConnectionHandle, ConnectionManager};
pub use connection_string::{AuthMechanism, ConnectionSpec, Scheme, normalize, preflight};
pub use discovery::{CollectionDescriptor, Discovery, DiscoveryReport, StrategyKind};
pub use error::{
    AtlasDumpError, ConnectError, ConnectErrorKind, ErrorType, PreflightError, RemoteError,
    Result, redact_connection_string,
};
pub use logging::init_logging;
pub use models::{CollectionEntry, DatabaseStats, ExportDocument, ValidationResult};
pub use service::{ExportOptions, ExportService};
pub use session::{Connector, RemoteCollection, RemoteSession};
