//! MongoDB implementation of the session seam.
//!
//! # Module Structure
//! - `errors`: driver error classification and masking
//!
//! # Security Guarantees
//! - All operations are read-only
//! - Driver messages are masked before they leave this module
//! - Every operation runs under a wall-clock guard, since the driver has no
//!   socket timeout of its own

mod errors;

use crate::config::ConnectionConfig;
use crate::connection_string::ConnectionSpec;
use crate::error::{ConnectError, ConnectErrorKind, RemoteError};
use crate::models::DatabaseStats;
use crate::session::{Connector, RemoteCollection, RemoteSession};
use async_trait::async_trait;
use errors::{connect_error, remote_error};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{Acknowledgment, ClientOptions, WriteConcern};
use mongodb::{Client, Collection};
use serde_json::Value;
use std::future::IntoFuture;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Characters MongoDB rejects in database names.
const INVALID_DATABASE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?', '\0'];

/// Opens real MongoDB clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct MongoConnector;

impl MongoConnector {
    /// Creates the connector.
    pub fn new() -> Self {
        Self
    }
}

fn client_options(options: &mut ClientOptions, config: &ConnectionConfig) {
    options.connect_timeout = Some(config.connect_timeout);
    options.server_selection_timeout = Some(config.server_selection_timeout);
    options.heartbeat_freq = Some(config.heartbeat_frequency);
    options.retry_writes = Some(config.retry_writes);
    options.write_concern = Some(
        WriteConcern::builder()
            .w(Acknowledgment::from(config.write_concern.clone()))
            .build(),
    );
    options.min_pool_size = Some(config.min_pool_size);
    options.app_name = Some(config.app_name.clone());
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(
        &self,
        spec: &ConnectionSpec,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, ConnectError> {
        let uri = spec.to_uri();
        let mut options = ClientOptions::parse(uri.as_str())
            .await
            .map_err(|e| connect_error(&e, spec))?;
        client_options(&mut options, config);

        let client = Client::with_options(options).map_err(|e| connect_error(&e, spec))?;

        // Client creation is lazy; a ping forces server selection and auth.
        let ping = tokio::time::timeout(
            config.socket_timeout,
            client.database("admin").run_command(doc! { "ping": 1 }).into_future(),
        )
        .await;
        let failure = match ping {
            Ok(Ok(_)) => None,
            Ok(Err(e)) => Some(connect_error(&e, spec)),
            Err(_) => Some(ConnectError::new(
                ConnectErrorKind::Timeout,
                format!(
                    "Server did not answer within {}ms",
                    config.socket_timeout.as_millis()
                ),
            )),
        };
        if let Some(error) = failure {
            client.shutdown().await;
            return Err(error);
        }

        debug!("MongoDB client ready for {}", spec);
        Ok(Box::new(MongoSession {
            client,
            socket_timeout: config.socket_timeout,
        }))
    }
}

/// Runs a driver operation under the wall-clock guard.
async fn guarded<T, F>(limit: Duration, operation: F) -> Result<T, RemoteError>
where
    F: IntoFuture<Output = mongodb::error::Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(remote_error(&e)),
        Err(_) => Err(RemoteError::TimedOut(limit)),
    }
}

/// Converts a BSON document to relaxed extended JSON.
fn document_to_json(document: Document) -> Value {
    Bson::Document(document).into_relaxed_extjson()
}

fn number(document: &Document, key: &str) -> Option<f64> {
    match document.get(key)? {
        Bson::Int32(v) => Some(f64::from(*v)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn count(document: &Document, key: &str) -> Option<u64> {
    match document.get(key)? {
        Bson::Int32(v) => u64::try_from(*v).ok(),
        Bson::Int64(v) => u64::try_from(*v).ok(),
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Bson::Double(v) if *v >= 0.0 => Some(*v as u64),
        _ => None,
    }
}

fn stats_from_document(document: &Document) -> DatabaseStats {
    DatabaseStats {
        collections: count(document, "collections"),
        views: count(document, "views"),
        objects: count(document, "objects"),
        avg_obj_size: number(document, "avgObjSize"),
        data_size: count(document, "dataSize"),
        storage_size: count(document, "storageSize"),
        indexes: count(document, "indexes"),
        index_size: count(document, "indexSize"),
    }
}

/// An open MongoDB client.
pub struct MongoSession {
    client: Client,
    socket_timeout: Duration,
}

impl std::fmt::Debug for MongoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoSession")
            .field("socket_timeout", &self.socket_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RemoteSession for MongoSession {
    fn resolve_database(&self, name: &str) -> Result<String, RemoteError> {
        if name.is_empty() || name.contains(INVALID_DATABASE_CHARS) {
            return Err(RemoteError::access(format!("Invalid database name '{name}'")));
        }
        Ok(name.to_string())
    }

    fn default_database(&self) -> Option<String> {
        self.client
            .default_database()
            .map(|db| db.name().to_string())
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, RemoteError> {
        guarded(
            self.socket_timeout,
            self.client.database(database).list_collection_names(),
        )
        .await
    }

    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn RemoteCollection>, RemoteError> {
        self.resolve_database(database)?;
        if name.is_empty() || name.contains('\0') || name.starts_with('$') {
            return Err(RemoteError::access(format!(
                "Invalid collection name '{name}'"
            )));
        }
        Ok(Box::new(MongoCollection {
            inner: self.client.database(database).collection::<Document>(name),
            socket_timeout: self.socket_timeout,
        }))
    }

    async fn database_stats(&self, database: &str) -> Result<DatabaseStats, RemoteError> {
        let document = guarded(
            self.socket_timeout,
            self.client
                .database(database)
                .run_command(doc! { "dbStats": 1 }),
        )
        .await?;
        Ok(stats_from_document(&document))
    }

    async fn list_database_names(&self) -> Result<Vec<String>, RemoteError> {
        guarded(self.socket_timeout, self.client.list_database_names()).await
    }

    async fn close(&self) {
        let shutdown = self.client.clone().shutdown();
        if tokio::time::timeout(self.socket_timeout, shutdown.into_future())
            .await
            .is_err()
        {
            warn!("MongoDB client shutdown did not finish in time");
        }
    }
}

struct MongoCollection {
    inner: Collection<Document>,
    socket_timeout: Duration,
}

#[async_trait]
impl RemoteCollection for MongoCollection {
    async fn count_documents(&self) -> Result<u64, RemoteError> {
        guarded(self.socket_timeout, self.inner.count_documents(doc! {})).await
    }

    async fn find_documents(
        &self,
        limit: Option<u32>,
        max_time: Option<Duration>,
    ) -> Result<Vec<Value>, RemoteError> {
        let fetch = async {
            let mut find = self.inner.find(doc! {});
            if let Some(limit) = limit {
                find = find.limit(i64::from(limit));
            }
            if let Some(max_time) = max_time {
                find = find.max_time(max_time);
            }
            let mut cursor = find.await?;

            let mut documents = Vec::new();
            while cursor.advance().await? {
                let document = cursor.deserialize_current()?;
                documents.push(document_to_json(document));
            }
            trace!(
                "Fetched {} documents from '{}'",
                documents.len(),
                self.inner.name()
            );
            Ok(documents)
        };

        guarded(self.socket_timeout, fetch).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Value>, RemoteError> {
        let filter = match ObjectId::parse_str(id) {
            Ok(oid) => doc! { "_id": oid },
            Err(_) => doc! { "_id": id },
        };
        let found = guarded(self.socket_timeout, self.inner.find_one(filter)).await?;
        Ok(found.map(document_to_json))
    }
}
