//! Driver error classification.

use crate::connection_string::ConnectionSpec;
use crate::error::{ConnectError, ConnectErrorKind, RemoteError};
use mongodb::error::{Error, ErrorKind};

/// Server code for "Unauthorized".
const UNAUTHORIZED: i32 = 13;
/// Server code for "AuthenticationFailed".
const AUTHENTICATION_FAILED: i32 = 18;
/// Atlas proxy code for rejected credentials.
const ATLAS_AUTH_ERROR: i32 = 8000;

/// Classifies a connection-phase driver error, masking the password.
pub(crate) fn connect_error(error: &Error, spec: &ConnectionSpec) -> ConnectError {
    let message = spec.mask(&error.to_string());

    let kind = match error.kind.as_ref() {
        ErrorKind::Authentication { .. } => ConnectErrorKind::AuthenticationFailed,
        ErrorKind::DnsResolve { .. } => ConnectErrorKind::HostNotFound,
        ErrorKind::InvalidArgument { .. } => ConnectErrorKind::ParseError,
        ErrorKind::ServerSelection { .. } => match ConnectErrorKind::from_message(&message) {
            ConnectErrorKind::Other | ConnectErrorKind::Timeout => {
                ConnectErrorKind::ServerSelectionTimeout
            }
            kind => kind,
        },
        ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            ConnectErrorKind::Timeout
        }
        ErrorKind::Command(command) => match command.code {
            UNAUTHORIZED => ConnectErrorKind::PermissionDenied,
            AUTHENTICATION_FAILED | ATLAS_AUTH_ERROR => ConnectErrorKind::AuthenticationFailed,
            _ => ConnectErrorKind::from_message(&message),
        },
        _ => ConnectErrorKind::from_message(&message),
    };

    ConnectError::new(kind, message)
}

/// Converts an operation-phase driver error.
pub(crate) fn remote_error(error: &Error) -> RemoteError {
    match error.kind.as_ref() {
        ErrorKind::Command(command) => {
            RemoteError::query_with_code(command.message.clone(), command.code)
        }
        ErrorKind::InvalidArgument { .. } => RemoteError::access(error.to_string()),
        _ => RemoteError::query(error.to_string()),
    }
}
