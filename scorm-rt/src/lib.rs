//! scorm-rt library interface
//!
//! SCORM 1.2 / 2004 runtime backend: keeps each learner's CMI state per
//! block, reconciles it against content re-uploads, and publishes grades to
//! the host platform.

pub mod api;
pub mod cmi;
pub mod db;
pub mod error;
pub mod grading;
pub mod package;
pub mod reconcile;
pub mod scoring;
pub mod services;
pub mod state;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::grading::GradePublisher;
use crate::package::{FsPackageStore, PackageManager};
use crate::services::{PackageService, RuntimeService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub runtime: RuntimeService,
    pub packages: PackageService,
    /// Directory served under `/content`
    pub content_root: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        store: Arc<FsPackageStore>,
        publisher: Arc<dyn GradePublisher>,
        lock_wait_ms: u64,
    ) -> Self {
        let content_root = store.root().to_path_buf();
        let packages = PackageManager::new(store);

        Self {
            runtime: RuntimeService::new(db.clone(), publisher, lock_wait_ms),
            packages: PackageService::new(db.clone(), packages, lock_wait_ms),
            db,
            content_root,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let content = ServeDir::new(&state.content_root);

    Router::new()
        .merge(api::runtime_routes())
        .merge(api::block_routes())
        .merge(api::health_routes())
        .nest_service("/content", content)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
