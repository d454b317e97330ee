//! Scripted in-memory deployment for tests.
//!
//! [`ScriptedConnector`] implements [`Connector`] over a [`FakeCluster`]
//! built in code. It records every connection attempt (redacted) and every
//! close, so tests can assert that connections are released exactly once.
//!
//! Available to other crates through the `test-support` feature.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::config::ConnectionConfig;
use crate::connection_string::ConnectionSpec;
use crate::error::{ConnectError, RemoteError};
use crate::models::DatabaseStats;
use crate::session::{Connector, RemoteCollection, RemoteSession};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PERMANENT: usize = usize::MAX;

/// A collection with scripted behaviour.
#[derive(Debug, Clone, Default)]
pub struct FakeCollection {
    documents: Vec<Value>,
    count_error: Option<RemoteError>,
    find_error: Option<RemoteError>,
    access_error: Option<RemoteError>,
    access_failures: Arc<AtomicUsize>,
    find_delay: Option<Duration>,
}

impl FakeCollection {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding `documents`.
    pub fn with_documents(documents: Vec<Value>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    /// A collection of `n` documents `{"_id": "doc-<i>", "seq": i}`.
    pub fn generated(n: usize) -> Self {
        Self::with_documents(
            (0..n)
                .map(|i| json!({"_id": format!("doc-{i}"), "seq": i}))
                .collect(),
        )
    }

    /// Counting fails with `error`.
    pub fn failing_count(mut self, error: RemoteError) -> Self {
        self.count_error = Some(error);
        self
    }

    /// Fetching fails with `error`.
    pub fn failing_find(mut self, error: RemoteError) -> Self {
        self.find_error = Some(error);
        self
    }

    /// Every attempt to obtain the collection fails with `error`.
    pub fn denying_access(mut self, error: RemoteError) -> Self {
        self.access_error = Some(error);
        self.access_failures = Arc::new(AtomicUsize::new(PERMANENT));
        self
    }

    /// Only the first attempt to obtain the collection fails.
    pub fn failing_first_access(mut self, error: RemoteError) -> Self {
        self.access_error = Some(error);
        self.access_failures = Arc::new(AtomicUsize::new(1));
        self
    }

    /// Fetches take `delay` before answering.
    pub fn with_find_delay(mut self, delay: Duration) -> Self {
        self.find_delay = Some(delay);
        self
    }

    fn access(&self) -> Result<(), RemoteError> {
        let Some(error) = &self.access_error else {
            return Ok(());
        };
        let failed = self
            .access_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                match remaining {
                    0 => None,
                    PERMANENT => Some(PERMANENT),
                    n => Some(n.saturating_sub(1)),
                }
            })
            .is_ok();
        if failed { Err(error.clone()) } else { Ok(()) }
    }
}

#[derive(Debug, Clone, Default)]
enum Catalog {
    #[default]
    Listed,
    Qualified,
    Hidden,
    Failing(RemoteError),
}

/// A database with scripted behaviour.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    collections: BTreeMap<String, FakeCollection>,
    catalog: Catalog,
    stats_error: Option<RemoteError>,
}

impl FakeDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection.
    pub fn with_collection(mut self, name: impl Into<String>, collection: FakeCollection) -> Self {
        self.collections.insert(name.into(), collection);
        self
    }

    /// The catalog lists nothing although collections exist.
    pub fn hiding_catalog(mut self) -> Self {
        self.catalog = Catalog::Hidden;
        self
    }

    /// The catalog lists `db.collection` names.
    pub fn qualifying_catalog(mut self) -> Self {
        self.catalog = Catalog::Qualified;
        self
    }

    /// Listing the catalog fails with `error`.
    pub fn failing_catalog(mut self, error: RemoteError) -> Self {
        self.catalog = Catalog::Failing(error);
        self
    }

    /// The statistics command fails with `error`.
    pub fn failing_stats(mut self, error: RemoteError) -> Self {
        self.stats_error = Some(error);
        self
    }
}

/// A deployment made of fake databases.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    databases: BTreeMap<String, FakeDatabase>,
    default_database: Option<String>,
    database_list_error: Option<RemoteError>,
}

impl FakeCluster {
    /// An empty deployment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a database.
    pub fn with_database(mut self, name: impl Into<String>, database: FakeDatabase) -> Self {
        self.databases.insert(name.into(), database);
        self
    }

    /// Sets the client's default database.
    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = Some(name.into());
        self
    }

    /// Listing databases fails with `error`.
    pub fn failing_database_list(mut self, error: RemoteError) -> Self {
        self.database_list_error = Some(error);
        self
    }
}

/// Connector over a [`FakeCluster`].
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    cluster: FakeCluster,
    queued_failures: Mutex<VecDeque<ConnectError>>,
    permanent_failure: Option<ConnectError>,
    connect_delay: Option<Duration>,
    rejected_databases: Vec<String>,
    attempts: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
    opens: AtomicUsize,
}

impl ScriptedConnector {
    /// A connector whose connections all succeed.
    pub fn new(cluster: FakeCluster) -> Self {
        Self {
            cluster,
            ..Self::default()
        }
    }

    /// The next connection attempt fails with `error`. Calls queue up.
    pub fn fail_next(self, error: ConnectError) -> Self {
        self.queued_failures.lock().unwrap().push_back(error);
        self
    }

    /// Every connection attempt fails with `error`.
    pub fn failing_always(mut self, error: ConnectError) -> Self {
        self.permanent_failure = Some(error);
        self
    }

    /// Connection attempts take `delay` before answering.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Sessions refuse to resolve `database`.
    pub fn rejecting_database(mut self, database: impl Into<String>) -> Self {
        self.rejected_databases.push(database.into());
        self
    }

    /// Number of sessions closed.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of sessions opened successfully.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Redacted URIs of every connection attempt, in order.
    pub fn attempted_uris(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
        spec: &ConnectionSpec,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn RemoteSession>, ConnectError> {
        self.attempts.lock().unwrap().push(spec.redacted());

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.permanent_failure {
            return Err(error.clone());
        }
        let queued = self.queued_failures.lock().unwrap().pop_front();
        if let Some(error) = queued {
            return Err(error);
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            cluster: self.cluster.clone(),
            rejected_databases: self.rejected_databases.clone(),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct FakeSession {
    cluster: FakeCluster,
    rejected_databases: Vec<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn resolve_database(&self, name: &str) -> Result<String, RemoteError> {
        if self.rejected_databases.iter().any(|d| d == name) {
            Err(RemoteError::access(format!("Invalid database name '{name}'")))
        } else {
            Ok(name.to_string())
        }
    }

    fn default_database(&self) -> Option<String> {
        self.cluster.default_database.clone()
    }

    async fn list_collection_names(&self, database: &str) -> Result<Vec<String>, RemoteError> {
        let Some(db) = self.cluster.databases.get(database) else {
            return Ok(Vec::new());
        };
        match &db.catalog {
            Catalog::Listed => Ok(db.collections.keys().cloned().collect()),
            Catalog::Qualified => Ok(db
                .collections
                .keys()
                .map(|name| format!("{database}.{name}"))
                .collect()),
            Catalog::Hidden => Ok(Vec::new()),
            Catalog::Failing(error) => Err(error.clone()),
        }
    }

    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn RemoteCollection>, RemoteError> {
        let collection = self
            .cluster
            .databases
            .get(database)
            .and_then(|db| db.collections.get(name))
            .cloned()
            .unwrap_or_default();
        collection.access()?;
        Ok(Box::new(FakeCollectionHandle { collection }))
    }

    async fn database_stats(&self, database: &str) -> Result<DatabaseStats, RemoteError> {
        let db = self.cluster.databases.get(database);
        if let Some(error) = db.and_then(|db| db.stats_error.clone()) {
            return Err(error);
        }
        let collections = db.map_or(0, |db| db.collections.len());
        let objects: usize = db.map_or(0, |db| {
            db.collections.values().map(|c| c.documents.len()).sum()
        });
        Ok(DatabaseStats {
            collections: Some(collections as u64),
            views: Some(0),
            objects: Some(objects as u64),
            ..DatabaseStats::default()
        })
    }

    async fn list_database_names(&self) -> Result<Vec<String>, RemoteError> {
        match &self.cluster.database_list_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.cluster.databases.keys().cloned().collect()),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeCollectionHandle {
    collection: FakeCollection,
}

#[async_trait]
impl RemoteCollection for FakeCollectionHandle {
    async fn count_documents(&self) -> Result<u64, RemoteError> {
        match &self.collection.count_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.collection.documents.len() as u64),
        }
    }

    async fn find_documents(
        &self,
        limit: Option<u32>,
        _max_time: Option<Duration>,
    ) -> Result<Vec<Value>, RemoteError> {
        if let Some(delay) = self.collection.find_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.collection.find_error {
            return Err(error.clone());
        }
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(self
            .collection
            .documents
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Value>, RemoteError> {
        if let Some(error) = &self.collection.find_error {
            return Err(error.clone());
        }
        Ok(self
            .collection
            .documents
            .iter()
            .find(|doc| {
                doc["_id"] == Value::String(id.to_string()) || doc["_id"]["$oid"] == id
            })
            .cloned())
    }
}
