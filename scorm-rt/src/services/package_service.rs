//! Package uploads and block settings

use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use scorm_common::time;

use crate::db::{self, Block, BlockSettings};
use crate::error::{Error, Result};
use crate::package::{PackageDescriptor, PackageManager};

#[derive(Clone)]
pub struct PackageService {
    db: SqlitePool,
    packages: PackageManager,
    lock_wait_ms: u64,
    /// Serializes descriptor replacement so `modified_at` stays monotonic
    upload_lock: Arc<Mutex<()>>,
}

impl PackageService {
    pub fn new(db: SqlitePool, packages: PackageManager, lock_wait_ms: u64) -> Self {
        Self {
            db,
            packages,
            lock_wait_ms,
            upload_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Browser URL of a package's launch page
    pub fn launch_url(&self, package: &PackageDescriptor) -> String {
        self.packages.store().resolve_url(&package.entry_path)
    }

    /// Install an uploaded archive and make it the block's current package
    ///
    /// On any failure the block keeps its previous descriptor.
    pub async fn upload(&self, block_id: &str, archive: Vec<u8>) -> Result<PackageDescriptor> {
        if archive.is_empty() {
            return Err(Error::PackageUpload("Empty upload".to_string()));
        }

        let packages = self.packages.clone();
        let installed = tokio::task::spawn_blocking(move || packages.install(&archive))
            .await
            .map_err(|e| scorm_common::Error::Internal(format!("Package install task failed: {}", e)))??;

        let _guard = self.upload_lock.lock().await;
        let previous = db::load_block(&self.db, block_id)
            .await?
            .and_then(|block| block.package);

        let mut modified_at = time::now();
        if let Some(previous) = &previous {
            if modified_at <= previous.modified_at {
                modified_at = previous.modified_at + Duration::microseconds(1);
            }
        }

        let descriptor = PackageDescriptor {
            version: installed.manifest.version,
            entry_path: installed.entry_path(),
            launch_data: installed.manifest.launch_data.clone(),
            modified_at,
        };
        db::save_package(&self.db, block_id, &descriptor, self.lock_wait_ms).await?;

        info!(
            block_id,
            package_id = %installed.package_id,
            version = %descriptor.version,
            modified_at = %time::format_timestamp(&descriptor.modified_at),
            replaced = previous.is_some(),
            "Block package replaced"
        );
        Ok(descriptor)
    }

    /// Validate and store a block's editable fields
    pub async fn update_settings(&self, block_id: &str, settings: BlockSettings) -> Result<Block> {
        settings.validate()?;
        db::save_settings(&self.db, block_id, &settings, self.lock_wait_ms).await?;
        info!(block_id, display_name = %settings.display_name, "Block settings updated");

        db::load_block(&self.db, block_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Block {}", block_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmi::ProtocolVersion;
    use crate::package::upload::test_support::build_zip;
    use crate::package::FsPackageStore;
    use scorm_common::db::init_memory_database;

    const MANIFEST_12: &str = r#"<manifest><metadata><schemaversion>1.2</schemaversion></metadata>
<resources><resource identifier="r1" href="start.html"/></resources></manifest>"#;

    async fn service(dir: &std::path::Path) -> PackageService {
        let pool = init_memory_database().await.unwrap();
        let store = Arc::new(FsPackageStore::new(dir, "/content"));
        PackageService::new(pool, PackageManager::new(store), 1000)
    }

    #[tokio::test]
    async fn test_upload_sets_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let archive = build_zip(&[("imsmanifest.xml", MANIFEST_12), ("start.html", "<html/>")]);

        let descriptor = service.upload("b1", archive).await.unwrap();

        assert_eq!(descriptor.version, ProtocolVersion::Scorm12);
        assert!(descriptor.entry_path.ends_with("/start.html"));
        assert!(dir.path().join(&descriptor.entry_path).exists());
        assert!(service.launch_url(&descriptor).starts_with("/content/"));

        let block = db::load_block(&service.db, "b1").await.unwrap().unwrap();
        assert_eq!(block.package, Some(descriptor));
    }

    #[tokio::test]
    async fn test_reupload_advances_modified_at() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let archive = build_zip(&[("imsmanifest.xml", MANIFEST_12), ("start.html", "<html/>")]);

        let first = service.upload("b1", archive.clone()).await.unwrap();
        let second = service.upload("b1", archive).await.unwrap();

        assert!(second.modified_at > first.modified_at);
        assert_ne!(first.entry_path, second.entry_path);
        // old content stays reachable for sessions still open on it
        assert!(dir.path().join(&first.entry_path).exists());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_package() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;
        let good = build_zip(&[("imsmanifest.xml", MANIFEST_12), ("start.html", "<html/>")]);
        let first = service.upload("b1", good).await.unwrap();

        let bad = build_zip(&[("start.html", "<html/>")]);
        let result = service.upload("b1", bad).await;

        assert!(matches!(result, Err(Error::PackageUpload(_))));
        let block = db::load_block(&service.db, "b1").await.unwrap().unwrap();
        assert_eq!(block.package, Some(first));
    }

    #[tokio::test]
    async fn test_update_settings_validates() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path()).await;

        let bad = BlockSettings {
            weight: -0.5,
            ..Default::default()
        };
        assert!(service.update_settings("b1", bad).await.is_err());
        assert!(db::load_block(&service.db, "b1").await.unwrap().is_none());

        let good = BlockSettings {
            display_name: "Module 3".to_string(),
            ..Default::default()
        };
        let block = service.update_settings("b1", good.clone()).await.unwrap();
        assert_eq!(block.settings, good);
    }
}
