//! Export engine.
//!
//! Turns a discovery report into an [`ExportDocument`]: database statistics
//! (best effort), then a bounded fetch of every discovered collection.
//! A failing collection is recorded inline and never stops the others.

use crate::config::ExportConfig;
use crate::connection::ConnectionHandle;
use crate::discovery::{CollectionDescriptor, Degradation, DiscoveryReport};
use crate::error::RemoteError;
use crate::models::{CollectionEntry, EMPTY_DATABASE_MESSAGE, ExportDocument, StatsBlock};
use crate::session::RemoteCollection;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Collections with this prefix are never exported.
pub const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Builds the export document for an established connection.
///
/// Collections are fetched with up to `config.concurrency` in flight.
/// Empty collections are left out; failed ones appear with an `error`.
pub async fn export(
    handle: &ConnectionHandle,
    report: &DiscoveryReport,
    config: &ExportConfig,
    export_date: DateTime<Utc>,
) -> ExportDocument {
    let database = report.database.as_str();
    let mut doc = ExportDocument::connected(
        export_date,
        database,
        handle.connection_details(database),
    );
    doc.discovery_strategy = report.strategy;
    doc.available_databases.clone_from(&report.available_databases);
    doc.suggested_database.clone_from(&report.suggested_database);
    doc.switched_from.clone_from(&report.switched_from);

    doc.database_stats = Some(match handle.session().database_stats(database).await {
        Ok(stats) => StatsBlock::Available(stats),
        Err(e) => {
            warn!("Could not retrieve stats for '{}': {}", database, e);
            StatsBlock::unavailable(handle.spec().mask(&e.to_string()))
        }
    });

    if report.collections.is_empty() {
        let spec = handle.spec();
        match &report.degraded {
            Some(Degradation::PermissionSuspected { reason }) => {
                doc.mark_permission_degraded(true, spec.mask(reason), spec.username());
            }
            Some(Degradation::CatalogFailed { reason }) => {
                doc.mark_permission_degraded(false, spec.mask(reason), spec.username());
            }
            Some(Degradation::Empty) | None => {
                doc.message = Some(EMPTY_DATABASE_MESSAGE.to_string());
            }
        }
        return doc;
    }

    let pending: Vec<CollectionDescriptor> = report
        .collections
        .iter()
        .filter(|c| !c.name.starts_with(SYSTEM_COLLECTION_PREFIX))
        .cloned()
        .collect();

    let results: Vec<(String, Option<CollectionEntry>)> = stream::iter(pending)
        .map(|descriptor| async move {
            let entry = export_collection(handle, database, &descriptor, config).await;
            (descriptor.name, entry)
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    for (name, entry) in results {
        match entry {
            Some(entry) => doc.insert_collection(name, entry),
            None => debug!("Collection '{}' is empty, omitting it", name),
        }
    }

    info!(
        "Exported {} documents from {} collections of '{}'",
        doc.total_documents(),
        doc.collections().len(),
        database
    );
    doc
}

/// Fetches one collection. `None` means it held no documents.
async fn export_collection(
    handle: &ConnectionHandle,
    database: &str,
    descriptor: &CollectionDescriptor,
    config: &ExportConfig,
) -> Option<CollectionEntry> {
    let name = descriptor.name.as_str();
    let session = handle.session();

    let fetched = match session.collection(database, name) {
        Ok(collection) => fetch(collection.as_ref(), name, config)
            .await
            .map_err(|e| e.to_string()),
        Err(access) => {
            let alternate = handle.requested_database();
            warn!(
                "Could not access '{}.{}', retrying through '{}': {}",
                database, name, alternate, access
            );
            let retried = match session.collection(alternate, name) {
                Ok(collection) => fetch(collection.as_ref(), name, config).await,
                Err(e) => Err(e),
            };
            retried.map_err(|alt| {
                format!("Failed to access collection: {access}. Alternative attempt error: {alt}")
            })
        }
    };

    match fetched {
        Ok(documents) if documents.is_empty() => None,
        Ok(documents) => Some(CollectionEntry::exported(documents, config.max_documents)),
        Err(message) => {
            warn!("Export of collection '{}' failed: {}", name, message);
            Some(CollectionEntry::failed(handle.spec().mask(&message)))
        }
    }
}

async fn fetch(
    collection: &dyn RemoteCollection,
    name: &str,
    config: &ExportConfig,
) -> Result<Vec<Value>, RemoteError> {
    let total = collection.count_documents().await?;
    debug!("Collection '{}' holds {} documents", name, total);

    let mut documents = collection
        .find_documents(Some(config.max_documents), Some(config.query_time_limit))
        .await?;
    documents.truncate(usize::try_from(config.max_documents).unwrap_or(usize::MAX));
    Ok(documents)
}
