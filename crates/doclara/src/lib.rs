pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod processor;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod thread;
pub mod workflow;

pub use config::{load_config, load_config_or_default, Config};
pub use db::{Database, DatabaseError, SqliteAnalysisRepository, SqliteCheckpointStore};
pub use error::{ConfigError, DoclaraError, Result};
pub use llm::{ChatCompletionsClient, ModelClient, ModelError};
pub use processor::{OcrError, OcrProcessor, TextExtractor};
pub use secrets::{KeySources, SecretError};
pub use service::{AnalysisResult, DocumentService, HistoryPage, Identity, ServiceError};
pub use workflow::{
    AnalyzeStage, ClassifyStage, CompletionHook, EngineError, GateResult, RetryPolicy,
    TextQualityGate, UserToken, WorkflowEngine, WorkflowState,
};
