//! Server settings.

use atlasdump_core::{ExportConfig, Result};
use clap::Args;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Listener and export settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "ATLASDUMP_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Deadline for a whole request, in seconds
    #[arg(long, default_value_t = 120, help = "Request deadline in seconds")]
    pub request_timeout: u64,

    /// Documents fetched per collection
    #[arg(long, default_value_t = 1000)]
    pub max_documents: u32,

    /// Collections fetched in parallel
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Let discovery switch to a populated sibling database
    #[arg(
        long,
        help = "Export the first populated database when the requested one looks empty"
    )]
    pub follow_populated_database: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            request_timeout: 120,
            max_documents: 1000,
            concurrency: 4,
            follow_populated_database: false,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Export settings derived from the flags.
    ///
    /// # Errors
    /// Returns a configuration error when a flag is out of range.
    pub fn export_config(&self) -> Result<ExportConfig> {
        let config = ExportConfig::new()
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_max_documents(self.max_documents)
            .with_concurrency(self.concurrency)
            .with_follow_populated_database(self.follow_populated_database);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        config: ServerConfig,
    }

    #[test]
    fn test_defaults_match_flags() {
        let parsed = Harness::try_parse_from(["atlasdump"]).unwrap().config;
        let default = ServerConfig::default();

        assert_eq!(parsed.bind_address(), default.bind_address());
        assert_eq!(parsed.max_documents, default.max_documents);
        assert!(!parsed.follow_populated_database);
    }

    #[test]
    fn test_export_config_from_flags() {
        let parsed = Harness::try_parse_from([
            "atlasdump",
            "--request-timeout",
            "30",
            "--max-documents",
            "50",
            "--follow-populated-database",
        ])
        .unwrap()
        .config;
        let export = parsed.export_config().unwrap();

        assert_eq!(export.request_timeout, Duration::from_secs(30));
        assert_eq!(export.max_documents, 50);
        assert!(export.follow_populated_database);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ServerConfig {
            concurrency: 0,
            ..ServerConfig::default()
        };
        assert!(config.export_config().is_err());
    }
}
