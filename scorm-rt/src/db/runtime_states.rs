//! Learner runtime state persistence

use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use scorm_common::db::retry_on_lock;
use scorm_common::time;

use crate::error::Result;
use crate::state::{RuntimeState, ScormStatus};

/// Load a learner's record, `None` before the first commit
pub async fn load_state(
    pool: &SqlitePool,
    user_id: &str,
    block_id: &str,
) -> Result<Option<RuntimeState>> {
    let row = sqlx::query(
        r#"
        SELECT cmi_data, modified_at, status, score
        FROM runtime_states
        WHERE user_id = ? AND block_id = ?
        "#,
    )
    .bind(user_id)
    .bind(block_id)
    .fetch_optional(pool)
    .await
    .map_err(scorm_common::Error::Database)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let cmi_data: String = row.get("cmi_data");
    let cmi_data: HashMap<String, String> = serde_json::from_str(&cmi_data).map_err(|e| {
        scorm_common::Error::Internal(format!("Failed to deserialize cmi_data: {}", e))
    })?;

    let modified_at: Option<String> = row.get("modified_at");
    let modified_at = modified_at
        .as_deref()
        .map(time::from_storage)
        .transpose()?;

    let status: String = row.get("status");
    let status: ScormStatus = status.parse()?;

    Ok(Some(RuntimeState {
        cmi_data,
        modified_at,
        status,
        score: row.get("score"),
    }))
}

/// Insert or replace a learner's record
pub async fn save_state(
    pool: &SqlitePool,
    user_id: &str,
    block_id: &str,
    state: &RuntimeState,
    max_wait_ms: u64,
) -> Result<()> {
    // Serialize before touching the pool
    let cmi_data = serde_json::to_string(&state.cmi_data).map_err(|e| {
        scorm_common::Error::Internal(format!("Failed to serialize cmi_data: {}", e))
    })?;
    let modified_at = state.modified_at.as_ref().map(time::to_storage);
    let status = state.status.as_str();

    retry_on_lock("save_runtime_state", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO runtime_states (user_id, block_id, cmi_data, modified_at, status, score)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, block_id) DO UPDATE SET
                cmi_data = excluded.cmi_data,
                modified_at = excluded.modified_at,
                status = excluded.status,
                score = excluded.score
            "#,
        )
        .bind(user_id)
        .bind(block_id)
        .bind(&cmi_data)
        .bind(&modified_at)
        .bind(status)
        .bind(state.score)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scorm_common::db::init_memory_database;

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let pool = init_memory_database().await.unwrap();
        assert!(load_state(&pool, "u1", "b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let pool = init_memory_database().await.unwrap();
        let mut state = RuntimeState {
            status: ScormStatus::Succeeded,
            score: 0.75,
            ..Default::default()
        };
        let payload = HashMap::from([
            ("cmi.suspend_data".to_string(), "page=3".to_string()),
            ("cmi.core.lesson_location".to_string(), "intro".to_string()),
        ]);
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::microseconds(123_456);
        state.apply_commit(&payload, at);

        save_state(&pool, "u1", "b1", &state, 1000).await.unwrap();
        let loaded = load_state(&pool, "u1", "b1").await.unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_overwrites_and_isolates_learners() {
        let pool = init_memory_database().await.unwrap();
        let first = RuntimeState {
            score: 0.2,
            status: ScormStatus::InProgress,
            ..Default::default()
        };
        let second = RuntimeState {
            score: 0.9,
            status: ScormStatus::Succeeded,
            ..Default::default()
        };

        save_state(&pool, "u1", "b1", &first, 1000).await.unwrap();
        save_state(&pool, "u2", "b1", &first, 1000).await.unwrap();
        save_state(&pool, "u1", "b1", &second, 1000).await.unwrap();

        assert_eq!(load_state(&pool, "u1", "b1").await.unwrap().unwrap(), second);
        assert_eq!(load_state(&pool, "u2", "b1").await.unwrap().unwrap(), first);
    }
}
