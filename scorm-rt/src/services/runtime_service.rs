//! SCORM runtime operations for one learner in one block
//!
//! Loads the block and the learner's record, runs the reconciliation
//! engine, publishes any new grade, then persists. If validation or
//! publishing fails nothing is stored. The host keeps a grade it accepted
//! even when the save that follows fails; that case is logged at warn level
//! and the learner's next graded commit publishes again.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use scorm_common::time;

use crate::cmi::ProtocolVersion;
use crate::db::{self, Block};
use crate::error::Result;
use crate::grading::{GradeEvent, GradePublisher};
use crate::reconcile::{CommitOutcome, LearnerRecord, ReconciliationEngine};
use crate::scoring::Scorable;
use crate::services::RecordLocks;
use crate::state::RuntimeState;

#[derive(Clone)]
pub struct RuntimeService {
    db: SqlitePool,
    locks: RecordLocks,
    publisher: Arc<dyn GradePublisher>,
    lock_wait_ms: u64,
}

impl RuntimeService {
    pub fn new(db: SqlitePool, publisher: Arc<dyn GradePublisher>, lock_wait_ms: u64) -> Self {
        Self {
            db,
            locks: RecordLocks::new(),
            publisher,
            lock_wait_ms,
        }
    }

    /// Block settings and package, defaults for a block never configured
    pub async fn block(&self, block_id: &str) -> Result<Block> {
        Ok(db::load_block(&self.db, block_id)
            .await?
            .unwrap_or_else(|| Block::unconfigured(block_id)))
    }

    pub async fn learner_state(&self, user_id: &str, block_id: &str) -> Result<Option<RuntimeState>> {
        db::load_state(&self.db, user_id, block_id).await
    }

    /// Value of one CMI element as the player should see it
    pub async fn get_value(
        &self,
        user_id: &str,
        block_id: &str,
        element: &str,
        version: ProtocolVersion,
        client_package: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let block = self.block(block_id).await?;
        let state = db::load_state(&self.db, user_id, block_id).await?;

        let engine = ReconciliationEngine::new(block.package.as_ref());
        let value = engine.get_value(state.as_ref(), element, version, client_package);

        debug!(user_id, block_id, element, value = %value, "scorm_get_value");
        Ok(value)
    }

    /// Apply one commit from the player
    pub async fn commit(
        &self,
        user_id: &str,
        block_id: &str,
        payload: &HashMap<String, String>,
        version: ProtocolVersion,
        client_package: Option<DateTime<Utc>>,
    ) -> Result<CommitOutcome> {
        let _guard = self.locks.acquire(user_id, block_id).await;

        let block = self.block(block_id).await?;
        let mut state = db::load_state(&self.db, user_id, block_id)
            .await?
            .unwrap_or_default();
        let policy = block.settings.grading_policy();

        let engine = ReconciliationEngine::new(block.package.as_ref());
        let outcome = {
            let mut record = LearnerRecord::new(&mut state, policy);
            let outcome = engine.commit(&mut record, payload, version, client_package, time::now())?;

            if outcome.graded {
                let grade = GradeEvent {
                    user_id: user_id.to_string(),
                    block_id: block_id.to_string(),
                    value: outcome.score,
                    max_value: record.max_score(),
                };
                self.publisher.publish(&grade).await?;
            }
            outcome
        };

        if let Err(err) = db::save_state(&self.db, user_id, block_id, &state, self.lock_wait_ms).await {
            if outcome.graded {
                warn!(
                    user_id,
                    block_id,
                    score = outcome.score,
                    error = %err,
                    "Grade published but runtime state not saved"
                );
            }
            return Err(err);
        }

        info!(
            user_id,
            block_id,
            elements = payload.len(),
            staleness = %outcome.staleness,
            status = %outcome.status,
            score = outcome.score,
            graded = outcome.graded,
            "scorm_commit"
        );
        Ok(outcome)
    }
}
