//! Database pool, schema, and write retry

pub mod init;
pub mod retry;

pub use init::*;
pub use retry::retry_on_lock;
