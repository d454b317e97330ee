//! The seam between the pipeline and a remote MongoDB deployment.
//!
//! The pipeline only talks to these traits. [`crate::mongodb::MongoConnector`]
//! is the production implementation; tests use the scripted connector from
//! [`crate::testing`].
//!
//! # Object Safety
//! All traits are object-safe and used through `Box<dyn ...>` /
//! `Arc<dyn ...>`.

use crate::config::ConnectionConfig;
use crate::connection_string::ConnectionSpec;
use crate::error::{ConnectError, RemoteError};
use crate::models::DatabaseStats;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Opens sessions against a deployment.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a client for `spec` and verifies it can reach a server.
    ///
    /// # Security
    /// Error messages must already be masked against the spec's password.
    ///
    /// # Errors
    /// Returns a classified [`ConnectError`] when the client cannot be
    /// created or the server does not answer.
    async fn connect(
        &self,
        spec: &ConnectionSpec,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, ConnectError>;
}

/// An open client.
///
/// All operations are read-only.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Obtains an accessor for `name`, failing if the name is unusable.
    fn resolve_database(&self, name: &str) -> Result<String, RemoteError>;

    /// The database the client would use by default, if any.
    fn default_database(&self) -> Option<String>;

    /// Lists collection names in `database`, possibly namespace-qualified.
    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, RemoteError>;

    /// Obtains a handle to one collection.
    ///
    /// # Errors
    /// [`RemoteError::Access`] when the handle cannot be obtained.
    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn RemoteCollection>, RemoteError>;

    /// Runs the database statistics command.
    async fn database_stats(&self, database: &str) -> Result<DatabaseStats, RemoteError>;

    /// Lists every database name visible to the credential.
    async fn list_database_names(&self) -> Result<Vec<String>, RemoteError>;

    /// Releases the client. Never fails; problems are logged.
    async fn close(&self);
}

/// A handle to one collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Counts all documents.
    async fn count_documents(&self) -> Result<u64, RemoteError>;

    /// Fetches documents in natural order.
    ///
    /// `limit` caps the number returned; `max_time` is sent to the server as
    /// the operation time limit.
    async fn find_documents(
        &self,
        limit: Option<u32>,
        max_time: Option<Duration>,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Fetches the document whose `_id` matches `id`.
    ///
    /// `id` is matched as an ObjectId when it parses as one, otherwise as a
    /// plain string.
    async fn find_by_id(&self, id: &str) -> Result<Option<Value>, RemoteError>;
}
