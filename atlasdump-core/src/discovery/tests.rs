//! Tests for the discovery cascade.

use super::*;
use crate::config::ConnectionConfig;
use crate::connection::ConnectionManager;
use crate::connection_string::normalize;
use crate::testing::{FakeCluster, FakeCollection, FakeDatabase, ScriptedConnector};
use std::sync::Arc;

async fn open(cluster: FakeCluster, uri: &str) -> (Arc<ScriptedConnector>, ConnectionHandle) {
    let connector = Arc::new(ScriptedConnector::new(cluster));
    let manager = ConnectionManager::new(connector.clone(), ConnectionConfig::default());
    let handle = manager.open(&normalize(uri).unwrap()).await.unwrap();
    (connector, handle)
}

fn names(report: &DiscoveryReport) -> Vec<&str> {
    report.collections.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn test_simple_collection_name() {
    assert_eq!(simple_collection_name("shop.orders"), "orders");
    assert_eq!(simple_collection_name("orders"), "orders");
    assert_eq!(simple_collection_name("a.b.c"), "c");
}

#[tokio::test]
async fn test_catalog_listing_strips_namespaces() {
    let cluster = FakeCluster::new().with_database(
        "shop",
        FakeDatabase::new()
            .qualifying_catalog()
            .with_collection("orders", FakeCollection::generated(2))
            .with_collection("users", FakeCollection::generated(1)),
    );
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net/shop").await;

    let report = Discovery::cascade(&ExportConfig::default())
        .discover(&handle)
        .await;
    handle.close().await;

    assert_eq!(report.strategy, Some(StrategyKind::CatalogListing));
    assert_eq!(names(&report), vec!["orders", "users"]);
    assert_eq!(report.database, "shop");
    assert!(report.degraded.is_none());
}

#[tokio::test]
async fn test_probe_used_when_catalog_hidden() {
    let cluster = FakeCluster::new().with_database(
        "admin",
        FakeDatabase::new()
            .hiding_catalog()
            .with_collection("users", FakeCollection::generated(3))
            .with_collection("items", FakeCollection::generated(2)),
    );
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net").await;

    let report = Discovery::cascade(&ExportConfig::default())
        .discover(&handle)
        .await;
    handle.close().await;

    assert_eq!(report.strategy, Some(StrategyKind::ProbeCommonNames));
    let users = report
        .collections
        .iter()
        .find(|c| c.name == "users")
        .unwrap();
    assert_eq!(users.known_count, Some(3));
    let items = report
        .collections
        .iter()
        .find(|c| c.name == "items")
        .unwrap();
    assert_eq!(items.known_count, Some(2));
}

#[tokio::test]
async fn test_probe_skips_failing_names() {
    let denied = RemoteError::query_with_code("not authorized", 13);
    let cluster = FakeCluster::new().with_database(
        "shop",
        FakeDatabase::new()
            .failing_catalog(denied.clone())
            .with_collection("users", FakeCollection::generated(1).failing_count(denied.clone()))
            .with_collection("orders", FakeCollection::generated(4)),
    );
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net/shop").await;

    let report = Discovery::cascade(&ExportConfig::default())
        .discover(&handle)
        .await;
    handle.close().await;

    assert!(!names(&report).contains(&"users"));
    assert!(names(&report).contains(&"orders"));
}

#[tokio::test]
async fn test_sibling_database_recorded_but_not_adopted_by_default() {
    let denied = RemoteError::query_with_code("not authorized on shop", 13);
    let cluster = FakeCluster::new()
        .with_database("admin", FakeDatabase::new())
        .with_database(
            "inventory",
            FakeDatabase::new().with_collection("parts", FakeCollection::generated(5)),
        );
    let cluster = cluster.with_database("shop", FakeDatabase::new().failing_catalog(denied));
    let config = ExportConfig {
        probe_collections: vec![],
        ..ExportConfig::default()
    };
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net/shop").await;

    let report = Discovery::cascade(&config).discover(&handle).await;
    handle.close().await;

    assert!(report.collections.is_empty());
    assert_eq!(
        report.available_databases,
        Some(vec![
            "admin".to_string(),
            "inventory".to_string(),
            "shop".to_string()
        ])
    );
    assert_eq!(report.suggested_database.as_deref(), Some("inventory"));
    assert!(report.switched_from.is_none());
    assert!(matches!(
        report.degraded,
        Some(Degradation::PermissionSuspected { .. })
    ));
}

#[tokio::test]
async fn test_sibling_database_adopted_when_following() {
    let cluster = FakeCluster::new()
        .with_database("admin", FakeDatabase::new().hiding_catalog())
        .with_database("local", FakeDatabase::new().with_collection("oplog.rs", FakeCollection::new()))
        .with_database(
            "inventory",
            FakeDatabase::new().with_collection("parts", FakeCollection::generated(5)),
        );
    let config = ExportConfig {
        probe_collections: vec![],
        follow_populated_database: true,
        ..ExportConfig::default()
    };
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net").await;

    let report = Discovery::cascade(&config).discover(&handle).await;
    handle.close().await;

    assert_eq!(report.strategy, Some(StrategyKind::SiblingDatabase));
    assert_eq!(report.database, "inventory");
    assert_eq!(report.switched_from.as_deref(), Some("admin"));
    assert_eq!(names(&report), vec!["parts"]);
}

#[tokio::test]
async fn test_empty_database_is_not_permission_degraded() {
    let (_connector, handle) = open(
        FakeCluster::new().with_database("shop", FakeDatabase::new()),
        "mongodb+srv://u:p@c0.x.net/shop",
    )
    .await;
    let config = ExportConfig {
        probe_collections: vec![],
        ..ExportConfig::default()
    };

    let report = Discovery::cascade(&config).discover(&handle).await;
    handle.close().await;

    assert!(report.collections.is_empty());
    assert_eq!(report.degraded, Some(Degradation::Empty));
}

#[tokio::test]
async fn test_catalog_failure_without_permission_shape() {
    let cluster = FakeCluster::new()
        .with_database(
            "shop",
            FakeDatabase::new().failing_catalog(RemoteError::query("cursor killed")),
        )
        .failing_database_list(RemoteError::query("listDatabases failed"));
    let config = ExportConfig {
        probe_collections: vec![],
        ..ExportConfig::default()
    };
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net/shop").await;

    let report = Discovery::cascade(&config).discover(&handle).await;
    handle.close().await;

    assert_eq!(
        report.degraded,
        Some(Degradation::CatalogFailed {
            reason: "cursor killed".to_string()
        })
    );
    assert!(report.available_databases.is_none());
}

#[tokio::test]
async fn test_catalog_only_never_probes() {
    let cluster = FakeCluster::new().with_database(
        "shop",
        FakeDatabase::new()
            .hiding_catalog()
            .with_collection("users", FakeCollection::generated(1)),
    );
    let (_connector, handle) = open(cluster, "mongodb+srv://u:p@c0.x.net/shop").await;

    let report = Discovery::catalog_only().discover(&handle).await;
    handle.close().await;

    assert!(report.collections.is_empty());
    assert_eq!(report.degraded, Some(Degradation::Empty));
}
