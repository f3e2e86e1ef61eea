//! scorm-rt - SCORM runtime service
//!
//! Serves the SCORM player API (get value / commit), package uploads, and
//! extracted package content for one host platform.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scorm_common::config::{ConfigOverrides, RootFolderInitializer, ServiceConfig, TomlConfig};
use scorm_rt::grading::{GradePublisher, HttpGradePublisher, LogGradePublisher};
use scorm_rt::package::FsPackageStore;
use scorm_rt::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "scorm-rt", version, about = "SCORM runtime service")]
struct Args {
    /// Configuration file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root folder holding the database and extracted packages
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Address to bind the HTTP listener to
    #[arg(long)]
    bind_address: Option<String>,

    /// HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Log filter, e.g. `info` or `scorm_rt=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Host endpoint that receives grade events
    #[arg(long)]
    grade_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default(args.config.as_deref());

    let config = ServiceConfig::resolve(
        ConfigOverrides {
            root_folder: args.root_folder,
            bind_address: args.bind_address,
            port: args.port,
            log_level: args.log_level,
            grade_endpoint: args.grade_endpoint,
        },
        &toml_config,
    )?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting scorm-rt v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = scorm_common::db::init_database(&db_path).await?;

    let packages_dir = initializer.packages_dir();
    info!("Packages: {}", packages_dir.display());
    let store = Arc::new(FsPackageStore::new(packages_dir, &config.content_base_url));

    let publisher: Arc<dyn GradePublisher> = match &config.grade_endpoint {
        Some(endpoint) => {
            info!("Publishing grades to {}", endpoint);
            Arc::new(HttpGradePublisher::new(endpoint.as_str())?)
        }
        None => {
            warn!("No grade endpoint configured, grades are only logged");
            Arc::new(LogGradePublisher)
        }
    };

    let state = AppState::new(pool, store, publisher, config.lock_wait_ms);
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
