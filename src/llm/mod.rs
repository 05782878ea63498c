//! Generative model clients used by the sentiment, insight and camera agents.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use self::gemini::{GeminiClient, ModelInfo};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response had no {0}")]
    MissingContent(&'static str),

    #[error("image payload is not valid base64: {0}")]
    ImageDecode(#[from] base64::DecodeError),
}

/// Prompt in, text out.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier, recorded alongside generated output.
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Prompt in, PNG bytes out.
#[async_trait]
pub trait ImageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, LlmError>;
}
