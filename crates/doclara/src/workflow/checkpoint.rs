//! Durable progress of a workflow thread.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;

use super::state::WorkflowState;

/// The step a thread is waiting on. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Classify,
    Analyze,
    Done,
    /// Stage 1 set an error message; the run ended without analysis.
    Failed,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Classify => "classify",
            WorkflowStep::Analyze => "analyze",
            WorkflowStep::Done => "done",
            WorkflowStep::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStep::Done | WorkflowStep::Failed)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classify" => Ok(WorkflowStep::Classify),
            "analyze" => Ok(WorkflowStep::Analyze),
            "done" => Ok(WorkflowStep::Done),
            "failed" => Ok(WorkflowStep::Failed),
            other => Err(StoreError::UnknownStep(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub thread_id: String,
    pub step: WorkflowStep,
    /// Never carries the user token.
    pub state: WorkflowState,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(step: WorkflowStep, state: &WorkflowState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            step,
            state: state.clone(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Checkpoint database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to encode checkpoint state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown workflow step '{0}' in checkpoint")]
    UnknownStep(String),

    #[error("Invalid checkpoint timestamp '{0}'")]
    InvalidTimestamp(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Keyed by thread id. `save` overwrites, so repeating it is harmless.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError>;

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;
}

/// Process-local store for tests and runs that need no durability.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, StoreError> {
        self.checkpoints
            .lock()
            .map_err(|_| StoreError::Database(DatabaseError::LockPoisoned))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.lock()?.get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut stored = checkpoint.clone();
        stored.state.user_token = Default::default();
        self.lock()?.insert(checkpoint.thread_id.clone(), stored);
        Ok(())
    }
}
