use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("asr transport error: {0}")]
    AsrTransport(String),

    #[error("tts vendor request failed: {0}")]
    TtsRequest(String),

    #[error("audio transcode failed: {0}")]
    Transcode(String),

    #[error("audio transcode timed out after {0:?}")]
    TranscodeTimeout(std::time::Duration),
}

impl From<PipelineError> for michael_core::Error {
    fn from(err: PipelineError) -> Self {
        michael_core::Error::Adapter(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
