// src/infra/errors.rs — Error types for shaderloop

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoopError {
    // Transport errors (the backend call itself failed)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    // The backend answered, but without a usable choice/content
    #[error("Malformed response from '{provider}': {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("No API key for provider '{provider}' (set {env_var})")]
    MissingApiKey { provider: String, env_var: String },

    #[error("Render backend error: {0}")]
    Render(String),

    #[error("Evidence encoding failed: {0}")]
    Encoding(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoopError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            LoopError::Provider {
                retriable: true,
                ..
            }
        )
    }

    /// Whether this error means the backend call never produced a reply.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LoopError::Provider { .. } | LoopError::MissingApiKey { .. }
        )
    }

    pub fn is_malformed_response(&self) -> bool {
        matches!(self, LoopError::MalformedResponse { .. })
    }
}
