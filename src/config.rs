use crate::error::AppError;
use crate::metadata::MetadataConfig;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "CHARMSEARCH_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Admin credentials
    #[validate(nested)]
    pub auth: AuthConfig,

    /// Identity service used to resolve group membership
    #[serde(default)]
    #[validate(nested)]
    pub identity: Option<IdentityConfig>,

    /// Search index configuration
    pub search: SearchConfig,

    /// Metadata resolution limits
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment (prefix `CHARMSEARCH`, separator `__`).
    ///
    /// `path` takes precedence over `CHARMSEARCH_CONFIG`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let config_path = path
            .map(|p| p.display().to_string())
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok());

        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        // Override with config file if one was given
        if let Some(config_path) = config_path {
            builder = builder.add_source(config::File::with_name(&config_path).required(true));
        }

        let config: Config = builder
            // Override with environment variables (prefix: CHARMSEARCH__)
            .add_source(
                config::Environment::with_prefix("CHARMSEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AuthConfig {
    /// Admin basic-auth user
    #[validate(
        length(min = 1, message = "no admin username in configuration"),
        custom(function = "validate_username")
    )]
    pub admin_username: String,

    /// Admin basic-auth password
    #[validate(length(min = 1, message = "no admin password in configuration"))]
    pub admin_password: String,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.contains(':') {
        let mut err = ValidationError::new("colon");
        err.message = Some("invalid user name in configuration: contains ':'".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IdentityConfig {
    /// Base URL of the identity manager API
    #[validate(url)]
    pub api_url: String,

    /// Agent credentials for the identity API
    pub username: String,
    pub password: String,

    /// Request timeout (seconds)
    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,

    /// How long resolved group lists are cached (seconds)
    #[serde(default = "default_group_cache_ttl")]
    pub group_cache_ttl_secs: u64,

    /// Maximum number of cached users
    #[serde(default = "default_group_cache_capacity")]
    pub group_cache_capacity: u64,
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn group_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.group_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_identity_timeout() -> u64 {
    10
}

fn default_group_cache_ttl() -> u64 {
    60
}

fn default_group_cache_capacity() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_with_file() {
        let file = write_config(
            r#"
            [auth]
            admin_username = "admin"
            admin_password = "example-password"

            [identity]
            api_url = "http://identity.example.com"
            username = "agent"
            password = "agent-password"
            "#,
        );

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.auth.admin_username, "admin");
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.metadata.max_concurrent, 8);

        let identity = config.identity.unwrap();
        assert_eq!(identity.group_cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_admin_credentials_are_required() {
        let file = write_config(
            r#"
            [auth]
            admin_username = "admin"
            admin_password = ""
            "#,
        );
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(err.to_string().contains("no admin password"));
    }

    #[test]
    fn test_admin_username_must_not_contain_colon() {
        let auth = AuthConfig {
            admin_username: "ad:min".to_string(),
            admin_password: "secret".to_string(),
        };
        let err = auth.validate().unwrap_err();
        assert!(err.to_string().contains("contains ':'"));
    }
}
