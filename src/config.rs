use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::security::abuse::AbuseSettings;
use crate::security::rate_limit::RateLimitSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub security: SecurityConfig,

    pub storage: StorageConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads. 0 uses the CPU core count.
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/fispq.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cors_allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret for bearer tokens. Override with
    /// `FISPQ_JWT_SECRET` in any real deployment.
    pub jwt_secret: String,

    pub token_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "fispq-development-secret-change-before-deploy".to_string(),
            token_ttl_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism
    pub argon2_parallelism: u32,

    pub rate_limits: RateLimitSettings,

    pub abuse: AbuseSettings,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            rate_limits: RateLimitSettings::default(),
            abuse: AbuseSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint, e.g. `https://s3.sa-east-1.amazonaws.com`
    /// or a local MinIO address.
    pub endpoint: String,

    pub region: String,

    pub bucket: String,

    /// Credentials come from the environment in real deployments; the
    /// config fields exist for local development only.
    pub access_key: String,

    pub secret_key: String,

    /// Uploads larger than this are refused before any transfer starts.
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.sa-east-1.amazonaws.com".to_string(),
            region: "sa-east-1".to_string(),
            bucket: "fispq-docs".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            security: SecurityConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Secrets and deploy-specific values are taken from the environment
    /// when present, so they never need to live in the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("FISPQ_DATABASE_URL") {
            self.general.database_url = value;
        }
        if let Ok(value) = std::env::var("FISPQ_JWT_SECRET") {
            self.auth.jwt_secret = value;
        }
        if let Ok(value) = std::env::var("FISPQ_PORT")
            && let Ok(port) = value.parse()
        {
            self.server.port = port;
        }
        if let Ok(value) = std::env::var("FISPQ_S3_ENDPOINT") {
            self.storage.endpoint = value;
        }
        if let Ok(value) = std::env::var("FISPQ_S3_REGION") {
            self.storage.region = value;
        }
        if let Ok(value) = std::env::var("FISPQ_S3_BUCKET") {
            self.storage.bucket = value;
        }
        if let Ok(value) = std::env::var("AWS_ACCESS_KEY_ID") {
            self.storage.access_key = value;
        }
        if let Ok(value) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_key = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 16 {
            anyhow::bail!("auth.jwt_secret must be at least 16 characters");
        }
        if self.auth.token_ttl_seconds <= 0 {
            anyhow::bail!("auth.token_ttl_seconds must be positive");
        }
        if self.server.port == 0 {
            anyhow::bail!("server.port must be set");
        }
        if self.storage.bucket.is_empty() {
            anyhow::bail!("storage.bucket must be set");
        }
        if self.storage.max_upload_bytes == 0 {
            anyhow::bail!("storage.max_upload_bytes must be positive");
        }
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("fispq").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".fispq").join("config.toml"));
        }

        paths
    }
}
