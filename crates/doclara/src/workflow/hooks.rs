//! Work the engine triggers once an analysis has been produced.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::{AnalysisRecord, AnalysisRepository, DatabaseError};
use crate::sanitize;
use crate::thread;

use super::state::WorkflowState;

/// Longest prefix of the OCR text kept alongside a stored analysis.
pub const STORED_TEXT_CHARS: usize = 1000;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Could not derive a user id from thread '{0}'")]
    IdentityResolutionFailed(String),

    #[error("Failed to store analysis: {0}")]
    PersistenceFailed(#[from] DatabaseError),
}

/// Called by the engine after a successful analysis stage.
///
/// Errors are logged by the engine and never change the workflow result.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_analysis_complete(&self, state: &WorkflowState) -> Result<(), PersistenceError>;
}

/// Stores each finished analysis in the user's history.
pub struct AnalysisRecorder {
    repo: Arc<dyn AnalysisRepository>,
}

impl AnalysisRecorder {
    pub fn new(repo: Arc<dyn AnalysisRepository>) -> Self {
        Self { repo }
    }

    /// Builds the row for `state`, scoped to the user named in its thread id.
    pub fn record_for(state: &WorkflowState) -> Result<AnalysisRecord, PersistenceError> {
        let user_id = thread::user_id_from_thread_id(&state.thread_id)
            .ok_or_else(|| PersistenceError::IdentityResolutionFailed(state.thread_id.clone()))?;

        let raw_text = (!state.raw_text.is_empty())
            .then(|| sanitize::truncate_chars(&state.raw_text, STORED_TEXT_CHARS).to_string());

        Ok(AnalysisRecord {
            thread_id: state.thread_id.clone(),
            user_id: user_id.to_string(),
            doc_type: state.doc_type.clone(),
            simplified_explanation: state.simplified_explanation.clone(),
            identified_risks: state.identified_risks.clone(),
            action_items: state.action_items.clone(),
            confidence_score: state.confidence_score,
            language: state.language.clone(),
            raw_text,
        })
    }
}

#[async_trait]
impl CompletionHook for AnalysisRecorder {
    async fn on_analysis_complete(&self, state: &WorkflowState) -> Result<(), PersistenceError> {
        let record = Self::record_for(state)?;
        let id = self.repo.insert(&record, &state.user_token).await?;
        log::info!(
            "Stored analysis {} for user {} (thread {})",
            id,
            record.user_id,
            record.thread_id
        );
        Ok(())
    }
}
