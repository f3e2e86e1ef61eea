//! HTTP API handlers for scorm-rt
//!
//! The player talks to `/api/blocks/:block_id/*`; extracted package files are
//! served from `/content`.

pub mod blocks;
pub mod health;
pub mod runtime;
pub mod user;

pub use blocks::block_routes;
pub use health::health_routes;
pub use runtime::runtime_routes;
pub use user::{CurrentUser, StaffUser};
