//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};

use crate::auth::{Credential, StaticCredentialProvider};
use crate::error::AppError;

/// Largest page the Mastodon home timeline serves
pub const MAX_PAGE_SIZE: usize = 40;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub timeline: TimelineConfig,
    pub account: AccountConfig,
    pub logging: LoggingConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Connection pool size (default: 5)
    pub max_connections: u32,
}

/// Remote server access
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Protocol ("http" or "https")
    pub protocol: String,
    pub user_agent: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Ask for the local-only home feed (default: true)
    pub local_only: bool,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Timeline paging
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Posts per page (default: 20, max 40)
    pub page_size: usize,
}

/// Logged-in account
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Server the account lives on (e.g. "mastodon.social")
    pub server: String,
    /// Bearer token; absent until the account has been authorized
    pub access_token: Option<String>,
}

impl AccountConfig {
    pub fn credential_provider(&self) -> StaticCredentialProvider {
        match self.access_token.as_deref().filter(|token| !token.is_empty()) {
            Some(token) => StaticCredentialProvider::new(Credential::new(&self.server, token)),
            None => StaticCredentialProvider::empty(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEEDLINE__SECTION__KEY)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("database.path", "data/feedline.db")?
            .set_default("database.max_connections", 5)?
            .set_default("remote.protocol", "https")?
            .set_default(
                "remote.user_agent",
                concat!("feedline/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("remote.timeout_seconds", 30)?
            .set_default("remote.local_only", true)?
            .set_default("timeline.page_size", 20)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FEEDLINE__*)
            .add_source(
                Environment::with_prefix("FEEDLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.remote.timeout_seconds == 0 {
            return Err(AppError::Config(
                "remote.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.timeline.page_size) {
            return Err(AppError::Config(format!(
                "timeline.page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.account.server.trim().is_empty() {
            return Err(AppError::Config("account.server must be set".to_string()));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        let protocol = self.remote.protocol.to_ascii_lowercase();
        match protocol.as_str() {
            "https" => {}
            "http" if is_local_server_domain(&self.account.server) => {
                tracing::warn!(
                    server = %self.account.server,
                    "Using plain http for local development"
                );
            }
            "http" => {
                return Err(AppError::Config(
                    "remote.protocol must be https for non-local servers".to_string(),
                ));
            }
            other => {
                return Err(AppError::Config(format!(
                    "remote.protocol must be http or https, got {:?}",
                    other
                )));
            }
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialProvider;

    fn valid_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/feedline-test.db"),
                max_connections: 5,
            },
            remote: RemoteConfig {
                protocol: "https".to_string(),
                user_agent: "feedline-test".to_string(),
                timeout_seconds: 30,
                local_only: true,
            },
            timeline: TimelineConfig { page_size: 20 },
            account: AccountConfig {
                server: "mastodon.social".to_string(),
                access_token: Some("token".to_string()),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let mut config = valid_config();
        config.remote.protocol = "http".to_string();

        for server in ["localhost:3000", "127.0.0.1:8080", "[::1]:4000"] {
            config.account.server = server.to_string();
            assert!(config.validate().is_ok(), "{} should allow http", server);
        }
    }

    #[test]
    fn validate_rejects_http_for_non_local_server() {
        let mut config = valid_config();
        config.remote.protocol = "http".to_string();

        let error = config
            .validate()
            .expect_err("public servers must require https");
        assert!(matches!(
            error,
            AppError::Config(message)
                if message.contains("remote.protocol must be https")
        ));
    }

    #[test]
    fn validate_rejects_out_of_range_page_size() {
        for page_size in [0, MAX_PAGE_SIZE + 1] {
            let mut config = valid_config();
            config.timeline.page_size = page_size;

            let error = config.validate().expect_err("page size out of range");
            assert!(matches!(
                error,
                AppError::Config(message) if message.contains("timeline.page_size")
            ));
        }
    }

    #[test]
    fn validate_rejects_zero_timeout_and_unknown_log_format() {
        let mut config = valid_config();
        config.remote.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.account.server = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn credential_provider_uses_account_section() {
        let config = valid_config();
        let credential = config.account.credential_provider().credential().unwrap();
        assert_eq!(credential.origin_server, "mastodon.social");
        assert_eq!(credential.access_token, "token");

        let mut config = valid_config();
        config.account.access_token = Some(String::new());
        assert!(config.account.credential_provider().credential().is_err());
    }
}
