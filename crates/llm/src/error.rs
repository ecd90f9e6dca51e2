use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("llm vendor returned {status}: {body}")]
    Vendor { status: u16, body: String },

    #[error("llm response had no completion content")]
    EmptyCompletion,
}

impl From<LlmError> for michael_core::Error {
    fn from(err: LlmError) -> Self {
        michael_core::Error::Adapter(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
