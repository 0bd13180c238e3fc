//! Configuration module
//!
//! Database, object storage and engine tunables, loaded from the environment
//! (with `.env` support). The engine receives [`SyncConfig`] by value.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_INTAKE_BUCKET, DEFAULT_MAX_CONCURRENT_TRANSFERS, DEFAULT_SEARCH_DEBOUNCE_MS,
    DEFAULT_SYNC_WAIT_TIMEOUT_SECS, DEFAULT_TICKET_AUDIO_BUCKET, DEFAULT_TICKET_MEDIA_BUCKET,
    DEFAULT_UPLOAD_BACKOFF_BASE_MS, DEFAULT_UPLOAD_MAX_ATTEMPTS,
};

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Where bucket objects live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::S3 => "s3",
            StorageBackend::Local => "local",
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [StorageBackend::S3, StorageBackend::Local]
            .into_iter()
            .find(|backend| backend.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("STORAGE_BACKEND must be 's3' or 'local', got '{}'", s))
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine tunables: retry policy, poll bound, concurrency cap, debounce.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub upload_max_attempts: u32,
    pub upload_backoff_base: Duration,
    pub sync_wait_timeout: Duration,
    pub max_concurrent_transfers: usize,
    pub search_debounce: Duration,
    /// Where downloads for assignment are staged. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upload_max_attempts: DEFAULT_UPLOAD_MAX_ATTEMPTS,
            upload_backoff_base: Duration::from_millis(DEFAULT_UPLOAD_BACKOFF_BASE_MS),
            sync_wait_timeout: Duration::from_secs(DEFAULT_SYNC_WAIT_TIMEOUT_SECS),
            max_concurrent_transfers: DEFAULT_MAX_CONCURRENT_TRANSFERS,
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            temp_dir: None,
        }
    }
}

impl SyncConfig {
    /// Delay before the given 1-based attempt: `(attempt - 1) * base`.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        self.upload_backoff_base * attempt.saturating_sub(1)
    }
}

/// Object storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub intake_bucket: String,
    pub ticket_media_bucket: String,
    pub ticket_audio_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: String,
    pub local_storage_base_url: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let storage = StorageConfig {
            backend,
            intake_bucket: lookup("INTAKE_BUCKET")
                .unwrap_or_else(|| DEFAULT_INTAKE_BUCKET.to_string()),
            ticket_media_bucket: lookup("TICKET_MEDIA_BUCKET")
                .unwrap_or_else(|| DEFAULT_TICKET_MEDIA_BUCKET.to_string()),
            ticket_audio_bucket: lookup("TICKET_AUDIO_BUCKET")
                .unwrap_or_else(|| DEFAULT_TICKET_AUDIO_BUCKET.to_string()),
            s3_region: lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
            s3_endpoint: lookup("S3_ENDPOINT"),
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| "./data/storage".to_string()),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000/storage".to_string()),
        };

        let sync = SyncConfig {
            upload_max_attempts: parse_or(
                &lookup,
                "UPLOAD_MAX_ATTEMPTS",
                DEFAULT_UPLOAD_MAX_ATTEMPTS,
            )?,
            upload_backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "UPLOAD_BACKOFF_BASE_MS",
                DEFAULT_UPLOAD_BACKOFF_BASE_MS,
            )?),
            sync_wait_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SYNC_WAIT_TIMEOUT_SECS",
                DEFAULT_SYNC_WAIT_TIMEOUT_SECS,
            )?),
            max_concurrent_transfers: parse_or(
                &lookup,
                "MAX_CONCURRENT_TRANSFERS",
                DEFAULT_MAX_CONCURRENT_TRANSFERS,
            )?,
            search_debounce: Duration::from_millis(parse_or(
                &lookup,
                "SEARCH_DEBOUNCE_MS",
                DEFAULT_SEARCH_DEBOUNCE_MS,
            )?),
            temp_dir: lookup("TEMP_DIR").map(PathBuf::from),
        };

        let config = Config {
            environment,
            database_url: lookup("DATABASE_URL"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
            storage,
            sync,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sync.upload_max_attempts == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_ATTEMPTS must be at least 1"));
        }

        if self.sync.max_concurrent_transfers == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSFERS must be at least 1"
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.s3_region.is_none() {
            return Err(anyhow::anyhow!(
                "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
            ));
        }

        let buckets = [
            &self.storage.intake_bucket,
            &self.storage.ticket_media_bucket,
            &self.storage.ticket_audio_bucket,
        ];
        if buckets.iter().any(|b| b.trim().is_empty()) {
            return Err(anyhow::anyhow!("Bucket names must not be empty"));
        }
        if buckets[0] == buckets[1] || buckets[0] == buckets[2] {
            return Err(anyhow::anyhow!(
                "INTAKE_BUCKET must differ from the ticket buckets"
            ));
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_engine_contract() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.sync.upload_max_attempts, 3);
        assert_eq!(config.sync.upload_backoff_base, Duration::from_millis(1000));
        assert_eq!(config.sync.sync_wait_timeout, Duration::from_secs(60));
        assert_eq!(config.sync.search_debounce, Duration::from_millis(300));
        assert_eq!(config.storage.intake_bucket, "media-intake");
        assert!(!config.is_production());
    }

    #[test]
    fn linear_backoff() {
        let sync = SyncConfig::default();
        assert_eq!(sync.backoff_before(1), Duration::ZERO);
        assert_eq!(sync.backoff_before(2), Duration::from_secs(1));
        assert_eq!(sync.backoff_before(3), Duration::from_secs(2));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("UPLOAD_MAX_ATTEMPTS", "5"),
            ("UPLOAD_BACKOFF_BASE_MS", "10"),
            ("MAX_CONCURRENT_TRANSFERS", "2"),
            ("ENVIRONMENT", "production"),
        ])
        .unwrap();
        assert_eq!(config.sync.upload_max_attempts, 5);
        assert_eq!(config.sync.upload_backoff_base, Duration::from_millis(10));
        assert_eq!(config.sync.max_concurrent_transfers, 2);
        assert!(config.is_production());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_from(&[("UPLOAD_MAX_ATTEMPTS", "zero")]).is_err());
        assert!(config_from(&[("UPLOAD_MAX_ATTEMPTS", "0")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "mysql://x")]).is_err());
        assert!(config_from(&[("STORAGE_BACKEND", "s3")]).is_err());
        assert!(config_from(&[("STORAGE_BACKEND", "ftp")]).is_err());
        assert!(config_from(&[("TICKET_AUDIO_BUCKET", "media-intake")]).is_err());
    }
}
