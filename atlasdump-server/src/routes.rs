//! Route handlers.
//!
//! Every handler takes the connection string from the `clusterUrl` query
//! parameter. It is never logged except in redacted form.

use crate::response::{ApiError, ValidationBody, attachment};
use crate::AppState;
use atlasdump_core::{ExportOptions, ValidationResult};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Query parameters accepted by the `/api/items` routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQuery {
    pub cluster_url: Option<String>,
    /// Opt-in switch to a populated sibling database
    pub follow_database: Option<bool>,
}

impl ClusterQuery {
    fn raw(&self) -> Option<&str> {
        self.cluster_url.as_deref()
    }
}

/// GET /api/test
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Server is running properly",
    }))
}

/// GET /api/items/validate
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<ValidationBody>, ApiError> {
    match state.service.validate_connection(query.raw()).await {
        ValidationResult::Connected(success) => Ok(Json(success.into())),
        ValidationResult::Failed(failure) => {
            warn!("Connection check failed: {}", failure.error_type);
            Err(ApiError::Validation(failure))
        }
    }
}

/// GET /api/items/download/json
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Response, ApiError> {
    let options = ExportOptions {
        follow_populated_database: query.follow_database,
    };
    let document = state
        .service
        .export(query.raw(), options)
        .await
        .map_err(ApiError::Export)?;

    if !document.connection_successful {
        return Err(ApiError::ConnectionFailed(Box::new(document)));
    }

    info!(
        "Export ready: {} with {} documents",
        document.file_name(),
        document.total_documents()
    );
    attachment(&document)
}

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let items = state
        .service
        .list_items(query.raw())
        .await
        .map_err(ApiError::Items)?;
    Ok(Json(items))
}

/// GET /api/items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .find_item(query.raw(), &id)
        .await
        .map_err(ApiError::Items)?
        .map(Json)
        .ok_or(ApiError::ItemNotFound)
}
