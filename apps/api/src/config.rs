use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// `None` when the external object store is not configured; uploads then
    /// go straight to blob storage.
    pub s3: Option<S3Config>,
    pub legacy_upload_root: PathBuf,
    pub max_upload_bytes: usize,
    pub external_store_timeout: Duration,
    pub cleanup_batch_size: i64,
    /// Bearer token guarding the operator endpoints. Unset disables them.
    pub admin_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base used to build public object URLs. Defaults to `<endpoint>/<bucket>`.
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3: S3Config::from_env(),
            legacy_upload_root: optional_env("LEGACY_UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            external_store_timeout: Duration::from_secs(parse_env(
                "EXTERNAL_STORE_TIMEOUT_SECS",
                15u64,
            )?),
            cleanup_batch_size: parse_env("CLEANUP_BATCH_SIZE", 100i64)?.max(1),
            admin_token: optional_env("ADMIN_TOKEN"),
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl S3Config {
    /// Returns `None` unless bucket, endpoint and both credentials are present.
    fn from_env() -> Option<Self> {
        let bucket = optional_env("S3_BUCKET")?;
        let endpoint = optional_env("S3_ENDPOINT")?;
        let access_key_id = optional_env("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = optional_env("AWS_SECRET_ACCESS_KEY")?;
        let public_base_url = optional_env("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));

        Some(S3Config {
            bucket,
            endpoint,
            region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id,
            secret_access_key,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats empty values the same as unset ones.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
