//! Export bounds and discovery behaviour.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Collection names probed when the catalog listing yields nothing.
pub const DEFAULT_PROBE_COLLECTIONS: [&str; 7] = [
    "users",
    "products",
    "items",
    "orders",
    "categories",
    "customers",
    "test",
];

/// Configuration for an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum documents fetched per collection
    pub max_documents: u32,
    /// Server-side time limit for each fetch
    pub query_time_limit: Duration,
    /// Deadline for the whole request, connection setup included
    pub request_timeout: Duration,
    /// Names tried by the probing discovery step
    pub probe_collections: Vec<String>,
    /// Collections fetched in parallel
    pub concurrency: usize,
    /// Whether discovery may adopt a populated sibling database
    pub follow_populated_database: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_documents: 1000,
            query_time_limit: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            probe_collections: DEFAULT_PROBE_COLLECTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            concurrency: 4,
            follow_populated_database: false,
        }
    }
}

impl ExportConfig {
    /// Creates an export config with safe defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates export configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_documents == 0 {
            return Err(crate::error::AtlasDumpError::configuration(
                "max_documents must be greater than 0",
            ));
        }

        if self.concurrency == 0 {
            return Err(crate::error::AtlasDumpError::configuration(
                "concurrency must be greater than 0",
            ));
        }

        if self.concurrency > 32 {
            return Err(crate::error::AtlasDumpError::configuration(
                "concurrency should not exceed 32 for safety",
            ));
        }

        if self.query_time_limit.is_zero() || self.request_timeout.is_zero() {
            return Err(crate::error::AtlasDumpError::configuration(
                "time limits must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Builder method to set the per-collection document cap.
    pub fn with_max_documents(mut self, max_documents: u32) -> Self {
        self.max_documents = max_documents;
        self
    }

    /// Builder method to set the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builder method to set fetch concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Builder method to allow adopting a populated sibling database.
    pub fn with_follow_populated_database(mut self, follow: bool) -> Self {
        self.follow_populated_database = follow;
        self
    }
}
