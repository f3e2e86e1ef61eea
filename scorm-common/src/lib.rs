//! # SCORM Runtime Common Library
//!
//! Shared code for the SCORM runtime service and its tooling:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Timestamp codec used on the player wire protocol
//! - Database pool and schema initialization

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
