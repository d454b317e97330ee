//! Credential protection.
//!
//! Passwords taken from caller connection strings live in zeroizing
//! containers and are masked out of any text that may leave the process.

mod credentials;

pub use credentials::Credentials;
pub use crate::error::{mask_secret, redact_connection_string};
