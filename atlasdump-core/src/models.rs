//! Result documents produced by the export and validation paths.
//!
//! Field names serialize in camelCase because the documents are handed to
//! HTTP callers and saved to disk as-is.

use crate::config::ConnectionConfig;
use crate::discovery::StrategyKind;
use crate::error::{AtlasDumpError, ErrorType};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fixed troubleshooting list attached to every failed-connection export.
pub const CONNECTION_SUGGESTIONS: [&str; 7] = [
    "Make sure your connection string is formatted correctly",
    "Check that your database user has proper permissions",
    "Verify IP whitelisting in MongoDB Atlas",
    "Try specifying a database name in your connection string",
    "Try adding '?authSource=admin' to your connection string",
    "Ensure your MongoDB Atlas cluster is active and not paused",
    "Try creating a new database user with Atlas Admin privileges",
];

/// Headline used when discovery suspects missing privileges.
pub const PERMISSION_ERROR_MESSAGE: &str =
    "You may not have sufficient permissions to read from this database";

/// Message used when the database is reachable but holds no collections.
pub const EMPTY_DATABASE_MESSAGE: &str = "No collections found in the database";

/// Headline stored on an unavailable statistics block.
pub const STATS_UNAVAILABLE: &str = "Could not retrieve stats";

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Where the export connected, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub database: String,
    pub auth_source: String,
}

/// Database statistics as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub collections: Option<u64>,
    pub views: Option<u64>,
    pub objects: Option<u64>,
    pub avg_obj_size: Option<f64>,
    pub data_size: Option<u64>,
    pub storage_size: Option<u64>,
    pub indexes: Option<u64>,
    pub index_size: Option<u64>,
}

/// Statistics block of an export document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatsBlock {
    Available(DatabaseStats),
    Unavailable {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl StatsBlock {
    /// Marks statistics as unavailable, keeping the cause.
    pub fn unavailable(details: impl Into<String>) -> Self {
        Self::Unavailable {
            error: STATS_UNAVAILABLE.to_string(),
            details: Some(details.into()),
        }
    }
}

/// Per-collection result.
///
/// A failed collection still carries `count: 0` and an empty `documents`
/// array so consumers can treat every entry uniformly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum CollectionEntry {
    Exported {
        count: u64,
        has_more: bool,
        documents: Vec<Value>,
    },
    Failed {
        error: String,
        count: u64,
        documents: Vec<Value>,
    },
}

impl CollectionEntry {
    /// Entry for a successful fetch. `cap` is the per-collection limit.
    pub fn exported(documents: Vec<Value>, cap: u32) -> Self {
        let count = u64::try_from(documents.len()).unwrap_or(u64::MAX);
        Self::Exported {
            count,
            has_more: count == u64::from(cap),
            documents,
        }
    }

    /// Entry for a collection whose fetch failed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            count: 0,
            documents: Vec::new(),
        }
    }

    /// Number of documents carried by this entry.
    pub fn count(&self) -> u64 {
        match self {
            Self::Exported { count, .. } | Self::Failed { count, .. } => *count,
        }
    }
}

/// Client options echoed back in the failure diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptionsSummary {
    #[serde(rename = "connectTimeoutMS")]
    pub connect_timeout_ms: u64,
    #[serde(rename = "socketTimeoutMS")]
    pub socket_timeout_ms: u64,
    #[serde(rename = "serverSelectionTimeoutMS")]
    pub server_selection_timeout_ms: u64,
    pub auth_source: String,
    pub retry_writes: bool,
    pub w: String,
}

impl ConnectionOptionsSummary {
    /// Summarizes `config` for the given `authSource`.
    pub fn from_config(config: &ConnectionConfig, auth_source: &str) -> Self {
        let ms = |d: std::time::Duration| u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        Self {
            connect_timeout_ms: ms(config.connect_timeout),
            socket_timeout_ms: ms(config.socket_timeout),
            server_selection_timeout_ms: ms(config.server_selection_timeout),
            auth_source: auth_source.to_string(),
            retry_writes: config.retry_writes,
            w: config.write_concern.clone(),
        }
    }
}

/// Diagnostics attached to a failed-connection export. Both URIs are masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub original_uri: String,
    pub modified_uri: String,
    pub connection_options: ConnectionOptionsSummary,
}

/// The export result.
///
/// `collections` and `total_documents` are only reachable through
/// [`ExportDocument::insert_collection`], which keeps the total equal to the
/// sum of per-collection counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(serialize_with = "serialize_timestamp")]
    pub export_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub connection_successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_details: Option<ConnectionDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_stats: Option<StatsBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_strategy: Option<StrategyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_databases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switched_from: Option<String>,
    collections: BTreeMap<String, CollectionEntry>,
    total_documents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl ExportDocument {
    fn empty(export_date: DateTime<Utc>, connection_successful: bool) -> Self {
        Self {
            export_date,
            database: None,
            connection_successful,
            connection_details: None,
            database_stats: None,
            discovery_strategy: None,
            available_databases: None,
            suggested_database: None,
            switched_from: None,
            collections: BTreeMap::new(),
            total_documents: 0,
            permission_error: None,
            error: None,
            error_type: None,
            error_details: None,
            technical_error: None,
            help_message: None,
            message: None,
            debug_info: None,
            suggestions: None,
        }
    }

    /// Starts a document for an established connection.
    pub fn connected(
        export_date: DateTime<Utc>,
        database: impl Into<String>,
        connection_details: ConnectionDetails,
    ) -> Self {
        let mut doc = Self::empty(export_date, true);
        doc.database = Some(database.into());
        doc.connection_details = Some(connection_details);
        doc
    }

    /// Builds the document for a connection that was never established.
    ///
    /// `technical_error` and `debug_info` must already be masked.
    pub fn connection_failed(
        export_date: DateTime<Utc>,
        friendly_error: impl Into<String>,
        error_type: ErrorType,
        technical_error: impl Into<String>,
        debug_info: DebugInfo,
    ) -> Self {
        let mut doc = Self::empty(export_date, false);
        doc.error = Some(friendly_error.into());
        doc.error_type = Some(error_type);
        doc.technical_error = Some(technical_error.into());
        doc.debug_info = Some(debug_info);
        doc.suggestions = Some(
            CONNECTION_SUGGESTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        );
        doc
    }

    /// Records a collection result and adds its count to the total.
    pub fn insert_collection(&mut self, name: impl Into<String>, entry: CollectionEntry) {
        let name = name.into();
        if let Some(previous) = self.collections.remove(&name) {
            self.total_documents = self.total_documents.saturating_sub(previous.count());
        }
        self.total_documents = self.total_documents.saturating_add(entry.count());
        self.collections.insert(name, entry);
    }

    /// Exported collections keyed by name.
    pub fn collections(&self) -> &BTreeMap<String, CollectionEntry> {
        &self.collections
    }

    /// Sum of per-collection counts.
    pub fn total_documents(&self) -> u64 {
        self.total_documents
    }

    /// Marks the document as permission-degraded.
    pub fn mark_permission_degraded(
        &mut self,
        permission_suspected: bool,
        details: impl Into<String>,
        username: Option<&str>,
    ) {
        self.permission_error = permission_suspected.then_some(true);
        self.error = Some(PERMISSION_ERROR_MESSAGE.to_string());
        self.error_details = Some(details.into());
        self.help_message = Some(permission_help(username.unwrap_or("<username>")));
    }

    /// Renders the document as indented JSON.
    ///
    /// # Errors
    /// Returns [`AtlasDumpError::Serialization`] when a value cannot be
    /// rendered.
    pub fn to_pretty_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AtlasDumpError::serialization("export document", e))
    }

    /// Download file name: `<database>-export-<timestamp>.json`.
    ///
    /// Falls back to `mongodb` when no database is known. The timestamp is
    /// the export date with `:` replaced by `-` and fractional seconds
    /// dropped.
    pub fn file_name(&self) -> String {
        let database = self
            .database
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("mongodb");
        format!(
            "{database}-export-{}.json",
            self.export_date.format("%Y-%m-%dT%H-%M-%S")
        )
    }
}

/// Step-by-step guide attached to permission-degraded exports.
pub fn permission_help(username: &str) -> String {
    format!(
        "To resolve permission problems in MongoDB Atlas:

1. Check the connection string:
   - Expected shape: mongodb+srv://<username>:<password>@<cluster>.mongodb.net/<database>
   - Add '?authSource=admin' if the user was created in the admin database
   - URL-encode special characters in the password

2. Check the database user's privileges:
   - Open Database Access in the Atlas dashboard
   - Edit the user '{username}'
   - Grant 'readAnyDatabase' or a read role on the target database

3. Check network access:
   - Make sure the calling IP address is on the access list

4. Check the database name:
   - Make sure the database in the connection string exists on the cluster
   - If unsure, connect to the 'admin' database and retry
"
    )
}

/// Outcome of a connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Connected(ValidationSuccess),
    Failed(ValidationFailure),
}

impl ValidationResult {
    /// Whether the connection was established.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Successful connection check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSuccess {
    pub database: String,
    pub collections: Vec<String>,
    /// Set when the connection worked but collections could not be listed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ValidationSuccess {
    /// Number of collections found.
    pub fn collections_count(&self) -> usize {
        self.collections.len()
    }
}

/// Failed connection check. All text is masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub error_type: ErrorType,
    /// Short headline
    pub error: String,
    /// Human-readable explanation
    pub message: String,
    /// Underlying driver message, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<String>,
    /// Offending parts of the connection string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}
