//! Blob storage for extracted package files
//!
//! Files are addressed as `<package_id>/<path inside package>`. A package id
//! is never reused, so stored files are immutable once written.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Where extracted packages live and how the browser reaches them
pub trait PackageStore: Send + Sync {
    /// Write every file of a package under `package_id`
    fn store(&self, package_id: &str, files: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Browser URL for a stored path
    fn resolve_url(&self, path: &str) -> String;
}

/// Package store on the local filesystem
pub struct FsPackageStore {
    root: PathBuf,
    base_url: String,
}

impl FsPackageStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PackageStore for FsPackageStore {
    fn store(&self, package_id: &str, files: Vec<(String, Vec<u8>)>) -> Result<()> {
        let package_dir = self.root.join(checked_relative(package_id)?);
        for (name, contents) in files {
            let target = package_dir.join(checked_relative(&name)?);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(scorm_common::Error::from)?;
            }
            std::fs::write(&target, contents).map_err(scorm_common::Error::from)?;
        }
        Ok(())
    }

    fn resolve_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Reject absolute paths and anything climbing out of the package directory
pub fn checked_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PackageUpload(format!("Unsafe path in package: {}", path)));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(Error::PackageUpload(format!("Empty path in package: {:?}", path)));
    }
    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_writes_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPackageStore::new(dir.path(), "/content");

        store
            .store(
                "pkg1",
                vec![
                    ("index.html".to_string(), b"<html/>".to_vec()),
                    ("assets/app.js".to_string(), b"init()".to_vec()),
                ],
            )
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("pkg1/index.html")).unwrap(), b"<html/>");
        assert_eq!(std::fs::read(dir.path().join("pkg1/assets/app.js")).unwrap(), b"init()");
    }

    #[test]
    fn test_store_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPackageStore::new(dir.path(), "/content");

        let result = store.store("pkg1", vec![("../evil.html".to_string(), Vec::new())]);
        assert!(matches!(result, Err(Error::PackageUpload(_))));
        assert!(!dir.path().join("evil.html").exists());
    }

    #[test]
    fn test_checked_relative() {
        assert_eq!(checked_relative("./a/b.html").unwrap(), PathBuf::from("a/b.html"));
        assert!(checked_relative("/etc/passwd").is_err());
        assert!(checked_relative("").is_err());
    }

    #[test]
    fn test_resolve_url_joins_base() {
        let store = FsPackageStore::new("/tmp", "https://cdn.example.com/scorm/");
        assert_eq!(
            store.resolve_url("abc/index.html"),
            "https://cdn.example.com/scorm/abc/index.html"
        );
    }
}
