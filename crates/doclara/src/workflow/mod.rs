//! The two-stage document workflow.

pub mod checkpoint;
pub mod engine;
pub mod gate;
pub mod hooks;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod stages;
pub mod state;

#[cfg(test)]
pub(crate) mod fakes;

pub use checkpoint::{Checkpoint, CheckpointStore, MemoryCheckpointStore, StoreError, WorkflowStep};
pub use engine::{EngineError, WorkflowEngine};
pub use gate::{GateResult, QualityCheck, TextQualityGate};
pub use hooks::{AnalysisRecorder, CompletionHook, PersistenceError};
pub use parser::{parse_analysis, parse_classification, DocumentCategory, Section};
pub use retry::{RetryPolicy, Transient};
pub use stages::{AnalyzeStage, ClassifyStage, StageFailure, StageOutcome};
pub use state::{UserToken, WorkflowState};
