//! Read path for the `items` collection.
//!
//! The collection is looked up as `items`, then `item`, then `items` again
//! as a default when neither answers a count.

use crate::connection::ConnectionHandle;
use crate::error::RemoteError;
use crate::session::RemoteCollection;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Preferred collection name.
pub const ITEMS_COLLECTION: &str = "items";

/// Singular fallback name.
pub const ITEM_COLLECTION: &str = "item";

async fn answers_count(handle: &ConnectionHandle, database: &str, name: &str) -> bool {
    match handle.session().collection(database, name) {
        Ok(collection) => match collection.count_documents().await {
            Ok(count) => {
                debug!("Collection '{}' answered with {} documents", name, count);
                true
            }
            Err(e) => {
                debug!("Collection '{}' could not be counted: {}", name, e);
                false
            }
        },
        Err(e) => {
            debug!("Collection '{}' could not be accessed: {}", name, e);
            false
        }
    }
}

/// Picks the items collection for the handle's database.
///
/// # Errors
/// Returns the access error of the default `items` collection when even
/// that cannot be obtained.
pub async fn resolve_items_collection(
    handle: &ConnectionHandle,
) -> Result<Box<dyn RemoteCollection>, RemoteError> {
    let database = handle.database();
    let name = if answers_count(handle, &database, ITEMS_COLLECTION).await {
        ITEMS_COLLECTION
    } else if answers_count(handle, &database, ITEM_COLLECTION).await {
        ITEM_COLLECTION
    } else {
        ITEMS_COLLECTION
    };
    handle.session().collection(&database, name)
}

/// Returns every document of the items collection.
///
/// # Errors
/// Returns the remote failure when the collection cannot be read.
pub async fn list_items(
    handle: &ConnectionHandle,
    max_time: Duration,
) -> Result<Vec<Value>, RemoteError> {
    let collection = resolve_items_collection(handle).await?;
    collection.find_documents(None, Some(max_time)).await
}

/// Returns the item whose `_id` matches `id`.
///
/// # Errors
/// Returns the remote failure when the collection cannot be read.
pub async fn find_item(handle: &ConnectionHandle, id: &str) -> Result<Option<Value>, RemoteError> {
    let collection = resolve_items_collection(handle).await?;
    collection.find_by_id(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::ConnectionManager;
    use crate::connection_string::normalize;
    use crate::testing::{FakeCluster, FakeCollection, FakeDatabase, ScriptedConnector};
    use serde_json::json;
    use std::sync::Arc;

    async fn open(database: FakeDatabase) -> ConnectionHandle {
        let connector = Arc::new(ScriptedConnector::new(
            FakeCluster::new().with_database("shop", database),
        ));
        ConnectionManager::new(connector, ConnectionConfig::default())
            .open(&normalize("mongodb+srv://u:p@c0.x.net/shop").unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_items() {
        let handle = open(FakeDatabase::new().with_collection(
            "items",
            FakeCollection::with_documents(vec![json!({"_id": "a"}), json!({"_id": "b"})]),
        ))
        .await;

        let items = list_items(&handle, Duration::from_secs(30)).await.unwrap();
        handle.close().await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_to_singular_collection() {
        let handle = open(
            FakeDatabase::new()
                .with_collection(
                    "items",
                    FakeCollection::new().failing_count(RemoteError::query("no such collection")),
                )
                .with_collection(
                    "item",
                    FakeCollection::with_documents(vec![json!({"_id": "only"})]),
                ),
        )
        .await;

        let items = list_items(&handle, Duration::from_secs(30)).await.unwrap();
        handle.close().await;
        assert_eq!(items, vec![json!({"_id": "only"})]);
    }

    #[tokio::test]
    async fn test_find_item_by_object_id_and_string() {
        let handle = open(FakeDatabase::new().with_collection(
            "items",
            FakeCollection::with_documents(vec![
                json!({"_id": {"$oid": "65f0c0ffee0000000000abcd"}, "name": "lamp"}),
                json!({"_id": "plain-id", "name": "desk"}),
            ]),
        ))
        .await;

        let lamp = find_item(&handle, "65f0c0ffee0000000000abcd").await.unwrap();
        let desk = find_item(&handle, "plain-id").await.unwrap();
        let missing = find_item(&handle, "nope").await.unwrap();
        handle.close().await;

        assert_eq!(lamp.unwrap()["name"], "lamp");
        assert_eq!(desk.unwrap()["name"], "desk");
        assert!(missing.is_none());
    }
}
