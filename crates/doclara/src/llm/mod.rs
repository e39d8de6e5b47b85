//! Language-model collaborator.
//!
//! The workflow treats the model as an opaque text-in/text-out function. Any
//! failure (transport, timeout, rate limit, malformed body) is a
//! [`ModelError`]; the stages do not distinguish between kinds.

pub mod chat;

pub use chat::ChatCompletionsClient;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to create HTTP client: {0}")]
    ClientInit(String),

    #[error("Could not reach model endpoint at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    ResponseParse(String),

    #[error("Model returned no content")]
    EmptyResponse,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one system instruction and one user message, returns the reply text.
    async fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        temperature: f32,
    ) -> Result<String, ModelError>;
}
