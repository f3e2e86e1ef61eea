//! CMI data model: protocol versions and element defaults

pub mod defaults;
pub mod version;

pub use defaults::default_value;
pub use version::ProtocolVersion;

/// Launch data element, identical name in both protocol versions
pub const LAUNCH_DATA: &str = "cmi.launch_data";
