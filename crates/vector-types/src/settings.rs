//! Configuration loading for vector-etl.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/vector-etl/config.{toml,yaml,json}.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "QDRANT_API_KEY";

/// Environment variable consulted when no CA certificate is configured.
pub const CA_CERT_ENV: &str = "QDRANT_CA_CERT";

/// Connection settings for the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantSettings {
    #[serde(default = "default_host")]
    pub host: String,

    /// REST port
    #[serde(default = "default_port")]
    pub port: u16,

    /// API key (prefer the QDRANT_API_KEY env var over the config file)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub https: bool,

    /// Verify TLS certificates
    #[serde(default = "default_true")]
    pub verify: bool,

    /// PEM file with an extra root certificate
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Replicas per shard for newly created collections
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6333
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_collection_name() -> String {
    "articles_collection".to_string()
}

fn default_replication_factor() -> u32 {
    1
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            https: false,
            verify: true,
            ca_cert: None,
            timeout_secs: default_timeout_secs(),
            collection_name: default_collection_name(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl QdrantSettings {
    /// Base URL of the REST API.
    pub fn url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Bulk upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Points per upsert request and per existence check
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upsert requests in flight at once
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Skip ids that already exist in the collection
    #[serde(default = "default_true")]
    pub check_existing: bool,

    /// Seconds to wait for the index to turn green after an upload
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Retries per batch on transient store errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_batch_size() -> usize {
    512
}

fn default_parallel() -> usize {
    1
}

fn default_wait_timeout_secs() -> u64 {
    6000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            parallel: default_parallel(),
            check_existing: true,
            wait_timeout_secs: default_wait_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub qdrant: QdrantSettings,

    #[serde(default)]
    pub upload: UploadSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant: QdrantSettings::default(),
            upload: UploadSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/vector-etl/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (VECTOR_ETL_*, nested with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "vector-etl")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: VECTOR_ETL_QDRANT__HOST, VECTOR_ETL_UPLOAD__BATCH_SIZE, VECTOR_ETL_LOG_LEVEL
        builder = builder.add_source(
            Environment::with_prefix("VECTOR_ETL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;
        settings.apply_env_fallbacks();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_fallbacks(&mut self) {
        if self.qdrant.api_key.is_none() {
            self.qdrant.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
        if self.qdrant.ca_cert.is_none() {
            self.qdrant.ca_cert = std::env::var(CA_CERT_ENV).ok().filter(|p| !p.is_empty());
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.qdrant.port == 0 {
            return Err(TypesError::Config("qdrant.port must be > 0".to_string()));
        }
        if self.qdrant.collection_name.trim().is_empty() {
            return Err(TypesError::Config(
                "qdrant.collection_name cannot be empty".to_string(),
            ));
        }
        if self.qdrant.replication_factor == 0 {
            return Err(TypesError::Config(
                "qdrant.replication_factor must be > 0".to_string(),
            ));
        }
        if self.upload.batch_size == 0 {
            return Err(TypesError::Config("upload.batch_size must be > 0".to_string()));
        }
        if self.upload.parallel == 0 {
            return Err(TypesError::Config("upload.parallel must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.qdrant.host, "localhost");
        assert_eq!(settings.qdrant.port, 6333);
        assert_eq!(settings.qdrant.collection_name, "articles_collection");
        assert_eq!(settings.upload.batch_size, 512);
        assert!(settings.upload.check_existing);
        assert_eq!(settings.log_level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_url() {
        let mut qdrant = QdrantSettings::default();
        assert_eq!(qdrant.url(), "http://localhost:6333");

        qdrant.https = true;
        qdrant.host = "qdrant.internal".to_string();
        assert_eq!(qdrant.url(), "https://qdrant.internal:6333");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[qdrant]
host = "10.0.0.5"
port = 6334
collection_name = "products"

[upload]
batch_size = 64
parallel = 4
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.qdrant.host, "10.0.0.5");
        assert_eq!(settings.qdrant.port, 6334);
        assert_eq!(settings.qdrant.collection_name, "products");
        assert_eq!(settings.upload.batch_size, 64);
        assert_eq!(settings.upload.parallel, 4);
        // untouched sections keep their defaults
        assert_eq!(settings.upload.wait_timeout_secs, 6000);
        assert_eq!(settings.qdrant.timeout_secs, 60);
    }

    #[test]
    fn test_missing_cli_config_file_is_error() {
        let result = Settings::load(Some("/nonexistent/vector-etl.toml"));
        assert!(matches!(result, Err(TypesError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.upload.batch_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.upload.parallel = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.qdrant.collection_name = "  ".to_string();
        assert!(settings.validate().is_err());
    }
}
