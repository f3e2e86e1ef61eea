//! Content packages: upload, manifest parsing, and file storage
//!
//! The reconciliation engine only ever sees the resulting
//! [`PackageDescriptor`]; everything else here is upload plumbing.

pub mod manifest;
pub mod store;
pub mod upload;

use chrono::{DateTime, Utc};

use crate::cmi::ProtocolVersion;

pub use manifest::{parse_manifest, ManifestInfo};
pub use store::{FsPackageStore, PackageStore};
pub use upload::{InstalledPackage, PackageManager};

/// The package currently attached to a block
///
/// Replaced wholesale by each successful upload; `modified_at` grows
/// monotonically across uploads to the same block.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub version: ProtocolVersion,
    /// Launch page relative to the package store, `<package_id>/<href>`
    pub entry_path: String,
    pub launch_data: Option<String>,
    pub modified_at: DateTime<Utc>,
}
