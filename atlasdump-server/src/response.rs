//! Response bodies and the HTTP error type.

use atlasdump_core::models::{ValidationFailure, ValidationSuccess};
use atlasdump_core::{AtlasDumpError, ErrorType, ExportDocument};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

/// Headline of every failed download.
pub const EXPORT_FAILED: &str = "Failed to export data from MongoDB";

/// Value of the `X-Processing` header on downloads.
pub const PROCESSING_NOTICE: &str = "Retrieving data from MongoDB Atlas";

/// Success message of the connection check.
pub const VALIDATION_SUCCEEDED: &str = "Connection to MongoDB Atlas established successfully";

/// Body of every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            technical: None,
            error_type: None,
            status: "error",
            details: None,
        }
    }
}

/// Body of a successful connection check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationBody {
    pub status: &'static str,
    pub message: &'static str,
    pub database: String,
    pub collections_count: usize,
    pub collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<ValidationSuccess> for ValidationBody {
    fn from(success: ValidationSuccess) -> Self {
        Self {
            status: "success",
            message: VALIDATION_SUCCEEDED,
            collections_count: success.collections_count(),
            database: success.database,
            collections: success.collections,
            note: success.note,
        }
    }
}

/// Failures surfaced by the HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Connection check failed
    Validation(ValidationFailure),
    /// Export rejected or aborted before a document could be produced
    Export(AtlasDumpError),
    /// Export ran but the connection was never established
    ConnectionFailed(Box<ExportDocument>),
    /// Item read path failed
    Items(AtlasDumpError),
    /// Requested item does not exist
    ItemNotFound,
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::ConnectionFailed(_) => StatusCode::BAD_REQUEST,
            Self::Export(e) | Self::Items(e) if is_bad_request(e) => StatusCode::BAD_REQUEST,
            Self::ItemNotFound => StatusCode::NOT_FOUND,
            Self::Export(_) | Self::Items(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorBody {
        match self {
            Self::Validation(failure) => {
                let mut body = ErrorBody::new(failure.error);
                body.message = Some(failure.message);
                body.technical = failure.technical;
                body.error_type = Some(failure.error_type);
                body.details = failure
                    .details
                    .and_then(|details| serde_json::to_value(details).ok());
                body
            }
            Self::Export(e) => {
                let mut body = ErrorBody::new(EXPORT_FAILED);
                body.message = Some(e.to_string());
                body.error_type = e.error_type();
                if let AtlasDumpError::Preflight(preflight) = &e {
                    body.details = preflight
                        .detail()
                        .map(|(part, problem)| serde_json::json!({ part: problem }));
                }
                body
            }
            Self::ConnectionFailed(document) => {
                let mut body = ErrorBody::new(EXPORT_FAILED);
                body.message = document.error.clone();
                body.error_type = document.error_type;
                body.details = serde_json::to_value(&*document).ok();
                body
            }
            Self::Items(e) => {
                let mut body = ErrorBody::new(e.to_string());
                body.error_type = e.error_type();
                body
            }
            Self::ItemNotFound => ErrorBody::new("Item not found"),
        }
    }
}

/// Caller-side problems: bad input, unreachable target, expired deadline.
fn is_bad_request(error: &AtlasDumpError) -> bool {
    matches!(
        error,
        AtlasDumpError::Preflight(_) | AtlasDumpError::Cancelled { .. }
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.body())).into_response()
    }
}

/// Renders an export document as a pretty-printed attachment.
///
/// # Errors
/// Returns [`ApiError::Export`] carrying the serialization failure.
pub fn attachment(document: &ExportDocument) -> Result<Response, ApiError> {
    let body = document.to_pretty_json().map_err(ApiError::Export)?;
    let disposition = content_disposition(&document.file_name());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static("x-processing"),
                HeaderValue::from_static(PROCESSING_NOTICE),
            ),
        ],
        body,
    )
        .into_response())
}

/// `attachment; filename="..."` with every byte outside printable ASCII,
/// and any quote or backslash, replaced by `_`.
pub fn content_disposition(file_name: &str) -> HeaderValue {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
