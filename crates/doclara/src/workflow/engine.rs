//! Sequencing of the two stages with a checkpoint after each one.
//!
//! ```text
//! Classify ──error──▶ Failed
//!    │
//!    └──ok──▶ Analyze ──▶ Done
//! ```
//!
//! The checkpoint names the next step to run, so a thread interrupted
//! between stages picks up where it stopped and never repeats a finished
//! stage.

use std::sync::Arc;

use log::{error, info, warn};
use thiserror::Error;
use tracing::{info_span, Instrument};

use crate::sanitize;

use super::checkpoint::{Checkpoint, CheckpointStore, StoreError, WorkflowStep};
use super::hooks::CompletionHook;
use super::retry::Transient;
use super::stages::{AnalyzeStage, ClassifyStage, StageFailure, StageOutcome};
use super::state::{UserToken, WorkflowState};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Checkpoint store failed for thread '{thread_id}': {source}")]
    Checkpoint {
        thread_id: String,
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Checkpoint { source, .. } => source.is_transient(),
        }
    }
}

impl Transient for EngineError {
    fn is_transient(&self) -> bool {
        EngineError::is_transient(self)
    }
}

/// Where a thread goes once classification has run.
pub fn next_after_classify(state: &WorkflowState) -> WorkflowStep {
    if state.has_error() {
        WorkflowStep::Failed
    } else {
        WorkflowStep::Analyze
    }
}

pub struct WorkflowEngine {
    classify: ClassifyStage,
    analyze: AnalyzeStage,
    checkpoints: Arc<dyn CheckpointStore>,
    hooks: Vec<Arc<dyn CompletionHook>>,
}

impl WorkflowEngine {
    pub fn new(
        classify: ClassifyStage,
        analyze: AnalyzeStage,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            classify,
            analyze,
            checkpoints,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Runs a submission to completion.
    ///
    /// An unfinished checkpoint for the same thread and the same text is
    /// continued. Anything else starts over and replaces the checkpoint.
    pub async fn run(&self, initial: WorkflowState) -> Result<WorkflowState, EngineError> {
        let span = info_span!(
            "workflow",
            thread_id = %initial.thread_id,
            text_hash = %sanitize::hash_text(&initial.raw_text),
            token = %sanitize::redact_token(initial.user_token.expose()),
        );

        async move {
            let (step, state) = match self.load(&initial.thread_id).await? {
                Some(checkpoint)
                    if !checkpoint.step.is_terminal()
                        && checkpoint.state.raw_text == initial.raw_text =>
                {
                    info!(
                        "Continuing thread {} from step {}",
                        initial.thread_id, checkpoint.step
                    );
                    let mut state = checkpoint.state;
                    state.user_token = initial.user_token;
                    (checkpoint.step, state)
                }
                _ => {
                    self.save(WorkflowStep::Classify, &initial).await?;
                    (WorkflowStep::Classify, initial)
                }
            };

            self.drive(step, state).await
        }
        .instrument(span)
        .await
    }

    /// Continues an interrupted thread with a fresh token.
    ///
    /// Returns the stored state untouched when the thread already finished,
    /// and `None` when it is unknown.
    pub async fn resume(
        &self,
        thread_id: &str,
        user_token: UserToken,
    ) -> Result<Option<WorkflowState>, EngineError> {
        let span = info_span!("workflow_resume", thread_id = %thread_id);

        async move {
            let Some(checkpoint) = self.load(thread_id).await? else {
                info!("No checkpoint for thread {}", thread_id);
                return Ok(None);
            };

            if checkpoint.step.is_terminal() {
                return Ok(Some(checkpoint.state));
            }

            info!("Resuming thread {} at step {}", thread_id, checkpoint.step);
            let mut state = checkpoint.state;
            state.user_token = user_token;
            self.drive(checkpoint.step, state).await.map(Some)
        }
        .instrument(span)
        .await
    }

    /// The last saved checkpoint of a thread.
    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        self.load(thread_id).await
    }

    async fn drive(
        &self,
        mut step: WorkflowStep,
        mut state: WorkflowState,
    ) -> Result<WorkflowState, EngineError> {
        loop {
            match step {
                WorkflowStep::Classify => {
                    let (next, outcome) = self.classify.run(state).await;
                    log_outcome("classify", &next.thread_id, &outcome);
                    state = next;
                    step = next_after_classify(&state);
                    self.save(step, &state).await?;
                }
                WorkflowStep::Analyze => {
                    let (next, outcome) = self.analyze.run(state).await;
                    log_outcome("analyze", &next.thread_id, &outcome);
                    state = next;
                    step = if state.has_error() {
                        WorkflowStep::Failed
                    } else {
                        WorkflowStep::Done
                    };
                    self.save(step, &state).await?;
                    if outcome.is_completed() {
                        self.run_hooks(&state).await;
                    }
                }
                WorkflowStep::Done | WorkflowStep::Failed => return Ok(state),
            }
        }
    }

    async fn run_hooks(&self, state: &WorkflowState) {
        for hook in &self.hooks {
            if let Err(e) = hook.on_analysis_complete(state).await {
                error!(
                    "Completion hook failed for thread {}: {}",
                    state.thread_id, e
                );
            }
        }
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, EngineError> {
        self.checkpoints
            .load(thread_id)
            .await
            .map_err(|source| EngineError::Checkpoint {
                thread_id: thread_id.to_string(),
                source,
            })
    }

    async fn save(&self, step: WorkflowStep, state: &WorkflowState) -> Result<(), EngineError> {
        self.checkpoints
            .save(&Checkpoint::new(step, state))
            .await
            .map_err(|source| EngineError::Checkpoint {
                thread_id: state.thread_id.clone(),
                source,
            })
    }
}

fn log_outcome(stage: &str, thread_id: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Completed => info!("Stage {} completed for thread {}", stage, thread_id),
        StageOutcome::Skipped => info!("Stage {} skipped for thread {}", stage, thread_id),
        StageOutcome::Failed(StageFailure::InputQualityRejected(check)) => info!(
            "Stage {} rejected input for thread {}: {:?}",
            stage, thread_id, check
        ),
        StageOutcome::Failed(failure) => warn!(
            "Stage {} failed for thread {}: {:?}",
            stage, thread_id, failure
        ),
    }
}
