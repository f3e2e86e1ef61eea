//! Database initialization
//!
//! Opens (creating if needed) the runtime database and makes sure every table
//! exists. Schema creation is idempotent.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open the database at `db_path`, creating file and tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets player reads proceed while a commit is being written
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every pooled connection to `sqlite::memory:` would see its own empty
/// database, so the pool is capped at one connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table used by the runtime
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_blocks_table(pool).await?;
    create_runtime_states_table(pool).await?;
    Ok(())
}

/// Block settings plus the descriptor of the most recent package upload
pub async fn create_blocks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blocks (
            block_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT 'Scorm',
            has_score INTEGER NOT NULL DEFAULT 1,
            weight REAL NOT NULL DEFAULT 1.0 CHECK (weight >= 0),
            allow_rescore INTEGER NOT NULL DEFAULT 1,
            ratio TEXT NOT NULL DEFAULT '4:3',
            icon_class TEXT NOT NULL DEFAULT 'problem',
            due TEXT,
            package_path TEXT,
            package_version TEXT,
            package_launch_data TEXT,
            package_modified TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Per (learner, block) runtime record
pub async fn create_runtime_states_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runtime_states (
            user_id TEXT NOT NULL,
            block_id TEXT NOT NULL,
            cmi_data TEXT NOT NULL DEFAULT '{}',
            modified_at TEXT,
            status TEXT NOT NULL DEFAULT 'UNATTENDED',
            score REAL NOT NULL DEFAULT 0.0,
            PRIMARY KEY (user_id, block_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
