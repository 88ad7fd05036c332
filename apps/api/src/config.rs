use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which persistence backend the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    /// Insight cache; enrichment runs uncached when unset.
    pub redis_url: Option<String>,
    /// Resume uploads go to S3 when set, otherwise to process memory.
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub enable_ai_enhancement: bool,
    pub ai_enhancement_timeout: Duration,
    pub ai_enhancement_concurrency: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_backend = match var("MATCH_STORE").as_deref().unwrap_or("postgres") {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => bail!("MATCH_STORE must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = var("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("Required environment variable 'DATABASE_URL' is not set");
        }

        let timeout_ms: u64 = parse_var(&var, "AI_ENHANCEMENT_TIMEOUT_MS", 8_000)?;
        let concurrency: usize = parse_var(&var, "AI_ENHANCEMENT_CONCURRENCY", 4)?;
        if concurrency == 0 {
            bail!("AI_ENHANCEMENT_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            store_backend,
            database_url,
            redis_url: var("REDIS_URL"),
            s3_bucket: var("S3_BUCKET"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: var("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            enable_ai_enhancement: parse_var(&var, "ENABLE_AI_ENHANCEMENT", true)?,
            ai_enhancement_timeout: Duration::from_millis(timeout_ms),
            ai_enhancement_concurrency: concurrency,
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            port: parse_var(&var, "PORT", 8080)?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_var<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
