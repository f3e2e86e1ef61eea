//! Per-record write locks
//!
//! A commit holds its record's lock across load, reconcile, publish, and
//! persist. Two commits for the same learner and block therefore never
//! interleave; different records never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are swept once the table grows past this
const SWEEP_THRESHOLD: usize = 1024;

type RecordKey = (String, String);

#[derive(Clone, Default)]
pub struct RecordLocks {
    inner: Arc<Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one learner's record in one block
    pub async fn acquire(&self, user_id: &str, block_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if table.len() > SWEEP_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table
                .entry((user_id.to_string(), block_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().map(|t| t.len()).unwrap_or(0)
    }
}
