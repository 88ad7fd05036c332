mod config;
mod db;
mod errors;
mod intake;
mod llm_client;
mod matching;
mod models;
mod routes;
mod state;
mod storage;
mod store;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::matching::cache::InsightCache;
use crate::matching::enhancement::{Enhancer, InsightProvider};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{BlobStore, MemoryBlobStore, S3BlobStore};
use crate::store::{DocumentStore, MatchStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match Engine v{}", env!("CARGO_PKG_VERSION"));

    // Persistence
    let (documents, matches): (Arc<dyn DocumentStore>, Arc<dyn MatchStore>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres store")?;
                let store = Arc::new(PgStore::new(create_pool(url).await?));
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    // Original uploads: S3 / MinIO when a bucket is configured
    let blobs: Arc<dyn BlobStore> = match &config.s3_bucket {
        Some(bucket) => {
            let s3 = build_s3_client(&config).await;
            info!("S3 client initialized (bucket: {bucket})");
            Arc::new(S3BlobStore::new(s3, bucket.clone()))
        }
        None => {
            warn!("S3_BUCKET not set; keeping resume uploads in memory");
            Arc::new(MemoryBlobStore::new())
        }
    };

    // Insight cache
    let cache = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis insight cache initialized");
            InsightCache::new(Some(client))
        }
        None => InsightCache::disabled(),
    };

    // AI enrichment is optional; scoring stays deterministic without it
    let provider: Option<Arc<dyn InsightProvider>> =
        match (&config.anthropic_api_key, config.enable_ai_enhancement) {
            (Some(key), true) => {
                let llm = LlmClient::new(key.clone(), config.ai_enhancement_timeout)?;
                info!("LLM client initialized (model: {})", llm_client::MODEL);
                Some(Arc::new(llm))
            }
            (None, true) => {
                warn!("ANTHROPIC_API_KEY not set; AI enhancement disabled");
                None
            }
            (_, false) => None,
        };
    let enhancer = Enhancer::new(provider, cache, config.ai_enhancement_timeout);

    let state = AppState::new(documents, matches, blobs, enhancer, config.clone());

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
/// Static credentials and a custom endpoint are used only when configured.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()));

    if let (Some(key_id), Some(secret)) =
        (&config.aws_access_key_id, &config.aws_secret_access_key)
    {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "match-engine-static",
        ));
    }
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let s3_config = loader.load().await;
    let mut builder = aws_sdk_s3::config::Builder::from(&s3_config);
    if config.s3_endpoint.is_some() {
        // MinIO serves buckets by path, not virtual host
        builder = builder.force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(builder.build())
}
