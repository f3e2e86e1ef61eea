//! Services behind the HTTP handlers

pub mod locks;
pub mod package_service;
pub mod runtime_service;

pub use locks::RecordLocks;
pub use package_service::PackageService;
pub use runtime_service::RuntimeService;
