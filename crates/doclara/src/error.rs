use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for callers that do not care which layer failed.
#[derive(Error, Debug)]
pub enum DoclaraError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("api key: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("ocr: {0}")]
    Ocr(#[from] crate::processor::OcrError),

    #[error("model: {0}")]
    Model(#[from] crate::llm::ModelError),

    #[error("database: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("workflow: {0}")]
    Workflow(#[from] crate::workflow::EngineError),

    #[error("{0}")]
    Service(#[from] crate::service::ServiceError),
}

/// Problems loading the config file (`~/.doclara/config.json` by default).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("{message}")]
    Validation { message: String },

    #[error("does not match schema: {errors}")]
    SchemaValidation { errors: String },
}

pub type Result<T> = std::result::Result<T, DoclaraError>;
