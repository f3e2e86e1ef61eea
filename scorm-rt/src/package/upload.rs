//! Package upload: zip archive → manifest + stored files

use std::io::{Cursor, Read};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::manifest::{parse_manifest, ManifestInfo};
use super::store::PackageStore;
use crate::error::{Error, Result};

/// Manifest file every package carries at its root
pub const MANIFEST_FILE: &str = "imsmanifest.xml";

/// A package that has been extracted into the store
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    pub package_id: String,
    pub manifest: ManifestInfo,
}

impl InstalledPackage {
    /// Entry page as a store path, `<package_id>/<href>`
    pub fn entry_path(&self) -> String {
        format!("{}/{}", self.package_id, self.manifest.entry_path)
    }
}

/// Unpacks uploaded archives into a [`PackageStore`]
#[derive(Clone)]
pub struct PackageManager {
    store: Arc<dyn PackageStore>,
}

impl PackageManager {
    pub fn new(store: Arc<dyn PackageStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PackageStore> {
        &self.store
    }

    /// Parse and extract a zip archive under a fresh package id
    ///
    /// The manifest is parsed before anything is written, so a package with a
    /// broken manifest leaves no trace in the store. Blocking; call from
    /// `spawn_blocking` inside async code.
    pub fn install(&self, archive: &[u8]) -> Result<InstalledPackage> {
        let (manifest, files) = unpack(archive)?;
        let package_id = Uuid::new_v4().simple().to_string();

        debug!(package_id = %package_id, files = files.len(), "Extracting package");
        self.store.store(&package_id, files)?;

        info!(
            package_id = %package_id,
            version = %manifest.version,
            entry = %manifest.entry_path,
            "Package installed"
        );
        Ok(InstalledPackage {
            package_id,
            manifest,
        })
    }
}

/// Upper bound on the total uncompressed size of one package
pub const MAX_EXTRACTED_BYTES: u64 = 1024 * 1024 * 1024;

/// Read the manifest and every file entry of a zip archive
pub fn unpack(archive: &[u8]) -> Result<(ManifestInfo, Vec<(String, Vec<u8>)>)> {
    unpack_limited(archive, MAX_EXTRACTED_BYTES)
}

/// [`unpack`] with an explicit cap on the total extracted size
///
/// Sizes declared in the archive are only used to fail early; the cap is
/// enforced on the bytes actually read.
pub fn unpack_limited(archive: &[u8], max_bytes: u64) -> Result<(ManifestInfo, Vec<(String, Vec<u8>)>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::PackageUpload(format!("Not a zip archive: {}", e)))?;

    let manifest = {
        let entry = zip.by_name(MANIFEST_FILE).map_err(|_| {
            Error::PackageUpload(format!("{} not found at package root", MANIFEST_FILE))
        })?;
        let declared = entry.size();
        let bytes = read_bounded(entry, declared, MANIFEST_FILE, max_bytes)?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| Error::PackageUpload(format!("Unreadable {}: {}", MANIFEST_FILE, e)))?;
        parse_manifest(&xml)?
    };

    let mut remaining = max_bytes;
    let mut files = Vec::new();
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .map_err(|e| Error::PackageUpload(format!("Corrupt archive entry {}: {}", index, e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry
            .enclosed_name()
            .ok_or_else(|| Error::PackageUpload(format!("Unsafe path in package: {}", entry.name())))?
            .to_string_lossy()
            .replace('\\', "/");
        let declared = entry.size();
        let contents = read_bounded(entry, declared, &name, remaining)?;
        remaining -= contents.len() as u64;
        files.push((name, contents));
    }

    Ok((manifest, files))
}

/// Read one entry, failing once more than `budget` bytes come out
fn read_bounded(entry: impl Read, declared: u64, name: &str, budget: u64) -> Result<Vec<u8>> {
    let too_large = || {
        Error::PackageUpload(format!(
            "Package too large to extract: {} exceeds the remaining {} bytes",
            name, budget
        ))
    };
    if declared > budget {
        return Err(too_large());
    }

    let mut contents = Vec::new();
    entry
        .take(budget.saturating_add(1))
        .read_to_end(&mut contents)
        .map_err(|e| Error::PackageUpload(format!("Unreadable entry {}: {}", name, e)))?;
    if contents.len() as u64 > budget {
        return Err(too_large());
    }
    Ok(contents)
}


#[cfg(test)]
mod tests {
    use super::test_support::build_zip;
    use super::*;
    use crate::cmi::ProtocolVersion;
    use crate::package::FsPackageStore;

    const MANIFEST: &str = r#"<manifest><metadata><schemaversion>2004 3rd Edition</schemaversion></metadata>
<resources><resource identifier="r" href="launch.html"/></resources></manifest>"#;

    #[test]
    fn test_install_extracts_and_parses() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackageManager::new(Arc::new(FsPackageStore::new(dir.path(), "/content")));
        let archive = build_zip(&[
            (MANIFEST_FILE, MANIFEST),
            ("launch.html", "<html></html>"),
            ("js/api.js", "var x;"),
        ]);

        let installed = manager.install(&archive).unwrap();

        assert_eq!(installed.manifest.version, ProtocolVersion::Scorm2004);
        assert_eq!(installed.entry_path(), format!("{}/launch.html", installed.package_id));
        let pkg_dir = dir.path().join(&installed.package_id);
        assert!(pkg_dir.join("launch.html").is_file());
        assert!(pkg_dir.join("js/api.js").is_file());
        assert!(pkg_dir.join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn test_each_install_gets_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackageManager::new(Arc::new(FsPackageStore::new(dir.path(), "/content")));
        let archive = build_zip(&[(MANIFEST_FILE, MANIFEST)]);

        let first = manager.install(&archive).unwrap();
        let second = manager.install(&archive).unwrap();
        assert_ne!(first.package_id, second.package_id);
    }

    #[test]
    fn test_missing_manifest_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackageManager::new(Arc::new(FsPackageStore::new(dir.path(), "/content")));
        let archive = build_zip(&[("index.html", "<html/>")]);

        let result = manager.install(&archive);
        assert!(matches!(result, Err(Error::PackageUpload(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Stored (uncompressed) archive whose headers claim `declared` bytes for `name`
    fn archive_with_declared_size(entries: &[(&str, &str)], name: &str, declared: u32) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buffer = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (entry, contents) in entries {
                writer.start_file(entry.to_string(), options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        let mut bytes = buffer.into_inner();

        // local header: size at +22, name at +30; central header: size at +24, name at +46
        for (signature, size_at, name_at) in [(b"PK\x03\x04", 22, 30), (b"PK\x01\x02", 24, 46)] {
            let mut patched = false;
            for pos in 0..bytes.len().saturating_sub(name_at + name.len()) {
                if &bytes[pos..pos + 4] == signature && &bytes[pos + name_at..pos + name_at + name.len()] == name.as_bytes() {
                    bytes[pos + size_at..pos + size_at + 4].copy_from_slice(&declared.to_le_bytes());
                    patched = true;
                }
            }
            assert!(patched, "header for {} not found", name);
        }
        bytes
    }

    #[test]
    fn test_honest_archive_within_limit() {
        let archive = archive_with_declared_size(&[(MANIFEST_FILE, MANIFEST), ("a.html", "x")], "a.html", 1);
        let (_, files) = unpack(&archive).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_inflated_declared_size_rejected() {
        let archive = archive_with_declared_size(
            &[(MANIFEST_FILE, MANIFEST), ("a.html", "x")],
            "a.html",
            0xFFFF_FFF0,
        );

        let result = unpack(&archive);
        assert!(matches!(result, Err(Error::PackageUpload(_))));
    }

    #[test]
    fn test_total_extracted_size_capped() {
        let big = "x".repeat(600);
        let archive = build_zip(&[(MANIFEST_FILE, MANIFEST), ("one.html", &big), ("two.html", &big)]);

        assert!(unpack_limited(&archive, 4096).is_ok());
        let result = unpack_limited(&archive, 1024);
        assert!(matches!(result, Err(Error::PackageUpload(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_not_a_zip_rejected() {
        let result = unpack(b"definitely not a zip");
        assert!(matches!(result, Err(Error::PackageUpload(_))));
    }
}
