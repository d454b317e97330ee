//! Client options for the per-request MongoDB client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options applied to every client opened by the connection manager.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
///
/// # Example
/// ```rust
/// use atlasdump_core::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig::new()
///     .with_connect_timeout(Duration::from_secs(10))
///     .with_app_name("nightly-export");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Time allowed for establishing a TCP/TLS connection
    pub connect_timeout: Duration,
    /// Wall-clock limit for any single operation on an open client
    pub socket_timeout: Duration,
    /// Time allowed for finding a suitable server
    pub server_selection_timeout: Duration,
    /// Interval between server monitoring checks
    pub heartbeat_frequency: Duration,
    /// Whether retryable writes are requested (no writes are issued)
    pub retry_writes: bool,
    /// Write concern requested on the client
    pub write_concern: String,
    /// Minimum pool size; zero keeps idle clients cheap
    pub min_pool_size: u32,
    /// Application name reported to the server
    pub app_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            socket_timeout: Duration::from_secs(45),
            server_selection_timeout: Duration::from_secs(30),
            heartbeat_frequency: Duration::from_secs(10),
            retry_writes: true,
            write_concern: "majority".to_string(),
            min_pool_size: 0,
            app_name: concat!("atlasdump-", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig(connect={}ms, socket={}ms, serverSelection={}ms, w={})",
            self.connect_timeout.as_millis(),
            self.socket_timeout.as_millis(),
            self.server_selection_timeout.as_millis(),
            self.write_concern
        )
    }
}

impl ConnectionConfig {
    /// Creates a connection config with the stock timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if a timeout is zero or the app name is empty
    pub fn validate(&self) -> crate::Result<()> {
        let timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("socket_timeout", self.socket_timeout),
            ("server_selection_timeout", self.server_selection_timeout),
            ("heartbeat_frequency", self.heartbeat_frequency),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(crate::error::AtlasDumpError::configuration(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.app_name.trim().is_empty() {
            return Err(crate::error::AtlasDumpError::configuration(
                "app_name cannot be empty",
            ));
        }

        Ok(())
    }

    /// Builder method to set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder method to set the application name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.socket_timeout, Duration::from_secs(45));
        assert_eq!(config.server_selection_timeout, Duration::from_secs(30));
        assert_eq!(config.heartbeat_frequency, Duration::from_secs(10));
        assert!(config.retry_writes);
        assert_eq!(config.write_concern, "majority");
        assert_eq!(config.min_pool_size, 0);
        assert!(config.app_name.starts_with("atlasdump-"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_config_validation() {
        let config = ConnectionConfig::new().with_connect_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connect_timeout"));

        let config = ConnectionConfig::new().with_app_name("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_config_display() {
        let display = ConnectionConfig::default().to_string();
        assert!(display.contains("connect=30000ms"));
        assert!(display.contains("w=majority"));
    }
}
