use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider response had no text")]
    EmptyResponse,

    #[error("unexpected provider response: {0}")]
    Decode(String),

    #[error("failed to read document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LlmError {
    /// Overload signals (503 / "overloaded") and attempt deadlines are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Api { status, message } => {
                *status == 503
                    || message.contains("UNAVAILABLE")
                    || message.to_lowercase().contains("overloaded")
            }
            LlmError::Timeout(_) => true,
            _ => false,
        }
    }
}
