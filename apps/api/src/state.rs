use std::sync::Arc;

use crate::config::Config;
use crate::storage::{LegacyFiles, ObjectStore, ResumeStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub resumes: Arc<dyn ResumeStore>,
    /// `None` when no external store is configured; uploads fall back to blob storage.
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub legacy: LegacyFiles,
    pub config: Config,
}
