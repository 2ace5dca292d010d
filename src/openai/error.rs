// src/openai/error.rs

/// Error surface of the assistant API. The not-found class is distinguished
/// because the liveness janitor reacts to it; everything else is generic.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("OpenAI API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("stream error: {0}")]
    Stream(String),
}

impl OpenAiError {
    /// Classify an unsuccessful response body. 404s and "No thread found"
    /// messages both count as the not-found class.
    pub fn from_response(status: u16, message: String) -> Self {
        if status == 404 || message.contains("No thread found") {
            OpenAiError::NotFound(message)
        } else {
            OpenAiError::Api { status, message }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OpenAiError::NotFound(_))
    }
}
