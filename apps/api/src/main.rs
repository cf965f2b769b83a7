use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use resume_api::config::Config;
use resume_api::db::create_pool;
use resume_api::routes::build_router;
use resume_api::state::AppState;
use resume_api::storage::{LegacyFiles, ObjectStore, PgResumeStore, S3ObjectStore};
use resume_api::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    init_tracing(env!("CARGO_CRATE_NAME"), &config.rust_log);

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize S3 / MinIO, if configured
    let object_store: Option<Arc<dyn ObjectStore>> = match &config.s3 {
        Some(s3) => {
            let store = S3ObjectStore::connect(s3).await;
            Some(Arc::new(store) as Arc<dyn ObjectStore>)
        }
        None => {
            warn!("External object store not configured; resumes will be stored in the database");
            None
        }
    };

    let legacy = LegacyFiles::new(config.legacy_upload_root.clone());
    info!("Legacy upload root: {}", legacy.root().display());

    // Build app state
    let state = AppState {
        resumes: Arc::new(PgResumeStore::new(db)),
        object_store,
        legacy,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
