//! Checkpoint repository for the `workflow_checkpoints` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::workflow::{Checkpoint, CheckpointStore, StoreError, WorkflowState};

use super::Database;

/// SQLite-backed [`CheckpointStore`]. One row per thread.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    db: Database,
}

impl SqliteCheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT step, state_json, updated_at FROM workflow_checkpoints WHERE thread_id = ?1",
                    params![thread_id],
                    |r| {
                        Ok((
                            r.get::<_, String>(0)?,
                            r.get::<_, String>(1)?,
                            r.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        let Some((step, state_json, updated_at)) = row else {
            return Ok(None);
        };

        let state: WorkflowState = serde_json::from_str(&state_json)?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|_| StoreError::InvalidTimestamp(updated_at.clone()))?
            .with_timezone(&Utc);

        Ok(Some(Checkpoint {
            thread_id: thread_id.to_string(),
            step: step.parse()?,
            state,
            updated_at,
        }))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(&checkpoint.state)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workflow_checkpoints (thread_id, step, state_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    step = excluded.step,
                    state_json = excluded.state_json,
                    updated_at = excluded.updated_at",
                params![
                    checkpoint.thread_id,
                    checkpoint.step.as_str(),
                    state_json,
                    checkpoint.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        log::debug!(
            "Saved checkpoint for thread {} at step {}",
            checkpoint.thread_id,
            checkpoint.step
        );
        Ok(())
    }
}
