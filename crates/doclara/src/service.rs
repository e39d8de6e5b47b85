//! Request-level operations: analyze an uploaded photo, browse history.
//!
//! Everything here is already authenticated. Callers pass an [`Identity`]
//! whose user id they have verified.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info_span, Instrument};

use crate::db::{AnalysisRepository, AnalysisRow, DatabaseError};
use crate::processor::{OcrError, TextExtractor};
use crate::thread;
use crate::workflow::{EngineError, RetryPolicy, UserToken, WorkflowEngine, WorkflowState};

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Could not read the document: {0}")]
    Ocr(#[from] OcrError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Analysis not found or not accessible")]
    NotFound,

    #[error("Workflow unavailable: {0}")]
    Unavailable(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub token: UserToken,
}

impl Identity {
    /// User ids end up as a segment of thread ids and may not contain `_`.
    pub fn new(user_id: impl Into<String>, token: UserToken) -> Result<Self, ServiceError> {
        let user_id = user_id.into();
        if user_id.is_empty()
            || user_id.contains(thread::SEPARATOR)
            || user_id.chars().any(char::is_whitespace)
        {
            return Err(ServiceError::InvalidRequest(format!(
                "invalid user id '{}'",
                user_id
            )));
        }
        Ok(Self { user_id, token })
    }
}

/// What the caller gets back from one analysis.
///
/// When `error` is set only `thread_id` and `error_message` carry
/// information; every analysis field is blanked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub thread_id: String,
    pub error: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    pub doc_type: String,
    pub language: String,
    pub simplified_explanation: String,
    pub identified_risks: Vec<String>,
    pub action_items: Vec<String>,
    pub confidence_score: f64,
}

impl AnalysisResult {
    pub fn from_state(state: WorkflowState) -> Self {
        if state.has_error() {
            return Self {
                thread_id: state.thread_id,
                error: true,
                error_message: state.error_message,
                raw_text: None,
                doc_type: String::new(),
                language: crate::workflow::state::DEFAULT_LANGUAGE.to_string(),
                simplified_explanation: String::new(),
                identified_risks: Vec::new(),
                action_items: Vec::new(),
                confidence_score: 0.0,
            };
        }

        Self {
            thread_id: state.thread_id,
            error: false,
            error_message: String::new(),
            raw_text: Some(state.raw_text),
            doc_type: state.doc_type,
            language: state.language,
            simplified_explanation: state.simplified_explanation,
            identified_risks: state.identified_risks,
            action_items: state.action_items,
            confidence_score: state.confidence_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub user_id: String,
    pub analyses: Vec<AnalysisRow>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

pub struct DocumentService {
    extractor: Arc<dyn TextExtractor>,
    engine: Arc<WorkflowEngine>,
    analyses: Arc<dyn AnalysisRepository>,
    retry: RetryPolicy,
}

impl DocumentService {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        engine: Arc<WorkflowEngine>,
        analyses: Arc<dyn AnalysisRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            extractor,
            engine,
            analyses,
            retry,
        }
    }

    /// OCR, then the full workflow on a thread bound to the caller.
    pub async fn analyze(
        &self,
        image: Vec<u8>,
        requested_thread_id: Option<&str>,
        identity: &Identity,
    ) -> Result<AnalysisResult, ServiceError> {
        let thread_id = thread::normalize(requested_thread_id, &identity.user_id);
        let span = info_span!("analyze_document", thread_id = %thread_id, image_bytes = image.len());

        async move {
            let extractor = Arc::clone(&self.extractor);
            let raw_text = tokio::task::spawn_blocking(move || extractor.extract_text(&image))
                .await
                .map_err(|e| OcrError::Failed(format!("OCR task failed: {}", e)))??;

            log::info!(
                "Extracted {} characters for thread {}",
                raw_text.chars().count(),
                thread_id
            );

            let initial = WorkflowState::new(raw_text, thread_id, identity.token.clone());
            let final_state = self.run_workflow(&initial).await?;
            Ok::<_, ServiceError>(AnalysisResult::from_state(final_state))
        }
        .instrument(span)
        .await
    }

    /// Finishes an interrupted thread owned by the caller.
    ///
    /// Unknown threads and threads bound to another user are both `NotFound`.
    pub async fn resume(
        &self,
        thread_id: &str,
        identity: &Identity,
    ) -> Result<AnalysisResult, ServiceError> {
        if thread::user_id_from_thread_id(thread_id) != Some(identity.user_id.as_str()) {
            log::warn!(
                "User {} asked to resume a thread it does not own",
                identity.user_id
            );
            return Err(ServiceError::NotFound);
        }

        let engine = &self.engine;
        let token = &identity.token;
        let state = self
            .retry
            .run(move |_| engine.resume(thread_id, token.clone()))
            .await?
            .ok_or(ServiceError::NotFound)?;
        Ok(AnalysisResult::from_state(state))
    }

    /// The user's stored analyses, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<HistoryPage, ServiceError> {
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(ServiceError::InvalidRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_HISTORY_LIMIT, limit
            )));
        }

        let (analyses, total) = self.analyses.list_by_user(user_id, limit, offset).await?;
        Ok(HistoryPage {
            user_id: user_id.to_string(),
            analyses,
            total,
            limit,
            offset,
            has_more: u64::from(offset) + u64::from(limit) < total,
        })
    }

    pub async fn analysis_for_thread(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<AnalysisRow, ServiceError> {
        self.analyses
            .find_by_thread(user_id, thread_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    async fn run_workflow(&self, initial: &WorkflowState) -> Result<WorkflowState, EngineError> {
        let engine = &self.engine;
        self.retry
            .run(move |attempt| {
                if attempt > 1 {
                    log::info!(
                        "Retrying workflow for thread {} (attempt {})",
                        initial.thread_id,
                        attempt
                    );
                }
                engine.run(initial.clone())
            })
            .await
    }
}
