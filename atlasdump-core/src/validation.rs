//! Connection check.
//!
//! Confirms a connection string works: pre-flight checks, a single
//! connection attempt (no fallback), and a catalog listing. A listing
//! failure still counts as a successful connection, with a note.

use crate::connection::ConnectionManager;
use crate::connection_string::{normalize, preflight};
use crate::discovery::{Degradation, Discovery};
use crate::error::{AtlasDumpError, ConnectError, ErrorType, PreflightError};
use crate::models::{ValidationFailure, ValidationResult, ValidationSuccess};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Headline for failed connection attempts.
pub const CONNECT_FAILED: &str = "Failed to connect to MongoDB Atlas";

impl From<PreflightError> for ValidationFailure {
    fn from(error: PreflightError) -> Self {
        let (headline, message) = match &error {
            PreflightError::MissingUrl => (error.to_string(), error.to_string()),
            PreflightError::InvalidFormat => {
                ("Invalid MongoDB URI format".to_string(), error.to_string())
            }
            _ => (
                "Invalid MongoDB URL".to_string(),
                format!("Invalid URL: {error}"),
            ),
        };
        let details = error.detail().map(|(part, problem)| {
            BTreeMap::from([(part.to_string(), problem.to_string())])
        });

        Self {
            error_type: error.error_type(),
            error: headline,
            message,
            technical: None,
            details,
        }
    }
}

impl From<&ConnectError> for ValidationFailure {
    fn from(error: &ConnectError) -> Self {
        Self {
            error_type: error.error_type(),
            error: CONNECT_FAILED.to_string(),
            message: error.kind.friendly_message().to_string(),
            technical: Some(error.message.clone()),
            details: None,
        }
    }
}

impl ValidationFailure {
    fn deadline_exceeded(deadline: Duration) -> Self {
        Self {
            error_type: ErrorType::Timeout,
            error: CONNECT_FAILED.to_string(),
            message: format!(
                "Connection check did not finish within {}s",
                deadline.as_secs()
            ),
            technical: None,
            details: None,
        }
    }
}

/// Checks that `raw` connects and reports the collections it can see.
///
/// Never retries with another auth mechanism. The connection, when opened,
/// is closed before returning.
pub async fn validate_connection(
    manager: &ConnectionManager,
    raw: Option<&str>,
    deadline: Duration,
) -> ValidationResult {
    if let Err(e) = preflight(raw) {
        info!("Connection string rejected before connecting: {}", e);
        return ValidationResult::Failed(e.into());
    }

    let spec = match normalize(raw.unwrap_or_default()) {
        Ok(spec) => spec,
        Err(AtlasDumpError::Preflight(e)) => return ValidationResult::Failed(e.into()),
        Err(e) => {
            warn!("Connection string could not be normalized: {}", e);
            return ValidationResult::Failed(PreflightError::InvalidFormat.into());
        }
    };

    let started = Instant::now();
    let handle = match tokio::time::timeout(deadline, manager.open(&spec)).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            warn!("Connection check for {} failed: {}", spec, e);
            return ValidationResult::Failed((&e).into());
        }
        Err(_) => return ValidationResult::Failed(ValidationFailure::deadline_exceeded(deadline)),
    };

    let remaining = deadline.saturating_sub(started.elapsed());
    let checked = ConnectionManager::scoped(handle, remaining, |handle| async move {
        let report = Discovery::catalog_only().discover(&handle).await;
        let note = match report.degraded {
            Some(Degradation::PermissionSuspected { reason } | Degradation::CatalogFailed { reason }) => {
                Some(format!(
                    "Connected successfully but cannot list collections: {}",
                    handle.spec().mask(&reason)
                ))
            }
            Some(Degradation::Empty) | None => None,
        };
        ValidationSuccess {
            database: report.database,
            collections: report.collections.into_iter().map(|c| c.name).collect(),
            note,
        }
    })
    .await;

    match checked {
        Ok(success) => {
            info!(
                "Connection check succeeded: '{}' with {} collections",
                success.database,
                success.collections_count()
            );
            ValidationResult::Connected(success)
        }
        Err(_) => ValidationResult::Failed(ValidationFailure::deadline_exceeded(deadline)),
    }
}
