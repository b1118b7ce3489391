//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    pub storage: StorageSettings,
    /// Background cleanup configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Object storage settings.
///
/// `provider` selects the backend: `local`, `s3`, or `azure_blob`.
/// Only the fields relevant to the selected provider need to be set.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Storage provider name: `local`, `s3`, or `azure_blob`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory (local provider).
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Endpoint URL (s3 provider).
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name (s3 provider).
    #[serde(default)]
    pub bucket: String,
    /// Access key ID (s3 provider).
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key (s3 provider).
    #[serde(default)]
    pub secret_access_key: String,
    /// Region (s3 provider).
    #[serde(default = "default_region")]
    pub region: String,
    /// Storage account name (azure_blob provider).
    #[serde(default)]
    pub account: String,
    /// Storage access key (azure_blob provider).
    #[serde(default)]
    pub access_key: String,
    /// Container name (azure_blob provider).
    #[serde(default)]
    pub container: String,
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_storage_root() -> String {
    "./storage".to_string()
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

/// Background cleanup configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Interval between expired-zone sweeps, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("DROPZONE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_host(), "0.0.0.0");
        assert_eq!(default_port(), 8080);
        assert_eq!(default_max_file_size(), 52_428_800);
        assert_eq!(CleanupConfig::default().sweep_interval_secs, 300);
    }
}
