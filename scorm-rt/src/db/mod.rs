//! Database access for blocks and learner runtime state
//!
//! The schema itself lives in `scorm_common::db`.

pub mod blocks;
pub mod runtime_states;

pub use blocks::{load_block, save_package, save_settings, AspectRatio, Block, BlockSettings, IconClass};
pub use runtime_states::{load_state, save_state};
