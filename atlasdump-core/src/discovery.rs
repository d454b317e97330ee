//! Collection discovery.
//!
//! Discovery runs an ordered list of strategies. Each strategy is tried only
//! if the previous one found nothing or failed:
//!
//! 1. [`CatalogListing`]: list the collections of the database
//! 2. [`ProbeCommonNames`]: count a fixed set of common collection names
//! 3. [`SiblingDatabases`]: enumerate the other databases on the cluster
//!
//! When all strategies come up empty the report says whether missing
//! privileges are the likely cause.

use crate::config::ExportConfig;
use crate::connection::ConnectionHandle;
use crate::error::RemoteError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, trace, warn};

/// System databases skipped when looking at sibling databases.
pub const SYSTEM_DATABASES: [&str; 3] = ["admin", "config", "local"];

/// Which strategy produced the collection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CatalogListing,
    ProbeCommonNames,
    SiblingDatabase,
}

/// A discovered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    /// Simple name, namespace prefix removed
    pub name: String,
    /// Count observed during discovery, when a probe produced one
    pub known_count: Option<u64>,
}

impl CollectionDescriptor {
    /// Descriptor with no known count.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            known_count: None,
        }
    }
}

/// Strips any namespace qualifier, keeping the text after the last `.`.
pub fn simple_collection_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Result of a single strategy.
#[derive(Debug)]
pub enum Probe {
    /// Collections were found. `database` is set when they live in a
    /// database other than the one being discovered.
    Found {
        collections: Vec<CollectionDescriptor>,
        database: Option<String>,
    },
    /// The strategy ran but found nothing.
    Nothing,
    /// The strategy could not run.
    Failed(RemoteError),
}

/// Facts gathered by strategies beyond the collection list.
#[derive(Debug, Default)]
pub struct DiscoveryNotes {
    /// Database names visible to the credential
    pub available_databases: Option<Vec<String>>,
    /// First populated sibling database, when one was seen but not adopted
    pub populated_database: Option<String>,
}

/// One discovery step.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    /// Which step this is.
    fn kind(&self) -> StrategyKind;

    /// Looks for collections in `database`.
    async fn attempt(
        &self,
        handle: &ConnectionHandle,
        database: &str,
        notes: &mut DiscoveryNotes,
    ) -> Probe;
}

/// Lists collections through the catalog.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogListing;

#[async_trait]
impl DiscoveryStrategy for CatalogListing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CatalogListing
    }

    async fn attempt(
        &self,
        handle: &ConnectionHandle,
        database: &str,
        _notes: &mut DiscoveryNotes,
    ) -> Probe {
        match handle.session().list_collection_names(database).await {
            Ok(names) => {
                let mut seen = HashSet::new();
                let collections: Vec<_> = names
                    .iter()
                    .map(|n| simple_collection_name(n))
                    .filter(|n| !n.is_empty() && seen.insert(n.to_string()))
                    .map(CollectionDescriptor::named)
                    .collect();
                if collections.is_empty() {
                    Probe::Nothing
                } else {
                    Probe::Found {
                        collections,
                        database: None,
                    }
                }
            }
            Err(e) => Probe::Failed(e),
        }
    }
}

/// Counts a fixed list of common collection names.
#[derive(Debug, Clone)]
pub struct ProbeCommonNames {
    names: Vec<String>,
}

impl ProbeCommonNames {
    /// Probes the given names in order.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[async_trait]
impl DiscoveryStrategy for ProbeCommonNames {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProbeCommonNames
    }

    async fn attempt(
        &self,
        handle: &ConnectionHandle,
        database: &str,
        _notes: &mut DiscoveryNotes,
    ) -> Probe {
        let mut collections = Vec::new();
        for name in &self.names {
            let counted = match handle.session().collection(database, name) {
                Ok(collection) => collection.count_documents().await,
                Err(e) => Err(e),
            };
            match counted {
                Ok(count) => {
                    trace!("Probe '{}' answered with {} documents", name, count);
                    collections.push(CollectionDescriptor {
                        name: name.clone(),
                        known_count: Some(count),
                    });
                }
                Err(e) => trace!("Probe '{}' failed: {}", name, e),
            }
        }

        if collections.is_empty() {
            Probe::Nothing
        } else {
            Probe::Found {
                collections,
                database: None,
            }
        }
    }
}

/// Enumerates other databases on the cluster.
///
/// The visible database names are always recorded. The first non-system
/// database with collections is adopted only when `follow` is set;
/// otherwise it is recorded as a suggestion.
#[derive(Debug, Clone, Copy)]
pub struct SiblingDatabases {
    follow: bool,
}

impl SiblingDatabases {
    /// Creates the step; `follow` allows adopting another database.
    pub fn new(follow: bool) -> Self {
        Self { follow }
    }
}

#[async_trait]
impl DiscoveryStrategy for SiblingDatabases {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SiblingDatabase
    }

    async fn attempt(
        &self,
        handle: &ConnectionHandle,
        _database: &str,
        notes: &mut DiscoveryNotes,
    ) -> Probe {
        let names = match handle.session().list_database_names().await {
            Ok(names) => names,
            Err(e) => return Probe::Failed(e),
        };
        notes.available_databases = Some(names.clone());

        for name in names
            .iter()
            .filter(|n| !SYSTEM_DATABASES.contains(&n.as_str()))
        {
            let listed = match handle.session().list_collection_names(name).await {
                Ok(listed) => listed,
                Err(e) => {
                    debug!("Could not list collections of database '{}': {}", name, e);
                    continue;
                }
            };
            if listed.is_empty() {
                continue;
            }

            if !self.follow {
                info!(
                    "Database '{}' has {} collections; not adopting it",
                    name,
                    listed.len()
                );
                notes.populated_database = Some(name.clone());
                return Probe::Nothing;
            }

            info!("Adopting database '{}' with {} collections", name, listed.len());
            let collections = listed
                .iter()
                .map(|n| CollectionDescriptor::named(simple_collection_name(n)))
                .collect();
            return Probe::Found {
                collections,
                database: Some(name.clone()),
            };
        }

        Probe::Nothing
    }
}

/// Why discovery produced no collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The catalog listing failed with an access-denied error
    PermissionSuspected { reason: String },
    /// The catalog listing failed for another reason
    CatalogFailed { reason: String },
    /// Every strategy ran and the database holds nothing
    Empty,
}

/// Outcome of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Discovered collections, in discovery order
    pub collections: Vec<CollectionDescriptor>,
    /// Database the collections belong to
    pub database: String,
    /// Strategy that produced the list
    pub strategy: Option<StrategyKind>,
    /// Originally requested database, when another was adopted
    pub switched_from: Option<String>,
    /// Database names seen by the sibling step
    pub available_databases: Option<Vec<String>>,
    /// Populated sibling database that was not adopted
    pub suggested_database: Option<String>,
    /// Why nothing was found, when nothing was found
    pub degraded: Option<Degradation>,
}

/// An ordered cascade of strategies.
pub struct Discovery {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl Discovery {
    /// Builds a cascade from explicit strategies.
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// The full three-step cascade used by exports.
    pub fn cascade(config: &ExportConfig) -> Self {
        Self::new(vec![
            Box::new(CatalogListing),
            Box::new(ProbeCommonNames::new(config.probe_collections.clone())),
            Box::new(SiblingDatabases::new(config.follow_populated_database)),
        ])
    }

    /// Catalog listing only, used by connection checks.
    pub fn catalog_only() -> Self {
        Self::new(vec![Box::new(CatalogListing)])
    }

    /// Runs the strategies in order against the handle's database.
    pub async fn discover(&self, handle: &ConnectionHandle) -> DiscoveryReport {
        let database = handle.database();
        let mut notes = DiscoveryNotes::default();
        let mut catalog_error: Option<RemoteError> = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            debug!("Discovery step {:?} on database '{}'", kind, database);

            match strategy.attempt(handle, &database, &mut notes).await {
                Probe::Found {
                    collections,
                    database: adopted,
                } => {
                    info!(
                        "Discovered {} collections via {:?}",
                        collections.len(),
                        kind
                    );
                    let (database, switched_from) = match adopted {
                        Some(adopted) if adopted != database => (adopted, Some(database)),
                        _ => (database, None),
                    };
                    return DiscoveryReport {
                        collections,
                        database,
                        strategy: Some(kind),
                        switched_from,
                        available_databases: notes.available_databases,
                        suggested_database: notes.populated_database,
                        degraded: None,
                    };
                }
                Probe::Nothing => debug!("Discovery step {:?} found nothing", kind),
                Probe::Failed(e) => {
                    warn!("Discovery step {:?} failed: {}", kind, e);
                    if kind == StrategyKind::CatalogListing {
                        catalog_error = Some(e);
                    }
                }
            }
        }

        let degraded = match catalog_error {
            Some(e) if e.is_permission_denied() => Degradation::PermissionSuspected {
                reason: e.to_string(),
            },
            Some(e) => Degradation::CatalogFailed {
                reason: e.to_string(),
            },
            None => Degradation::Empty,
        };
        warn!("No accessible collections found in '{}'", database);

        DiscoveryReport {
            collections: Vec::new(),
            database,
            strategy: None,
            switched_from: None,
            available_databases: notes.available_databases,
            suggested_database: notes.populated_database,
            degraded: Some(degraded),
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<_> = self.strategies.iter().map(|s| s.kind()).collect();
        f.debug_struct("Discovery").field("strategies", &kinds).finish()
    }
}

#[cfg(test)]
mod tests;
