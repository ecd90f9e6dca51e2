use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("telephony request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telephony vendor rejected the request: {status} {body}")]
    VendorRejected { status: u16, body: String },

    #[error("media channel is closed")]
    ChannelClosed,
}

impl From<TransportError> for michael_core::Error {
    fn from(err: TransportError) -> Self {
        michael_core::Error::Adapter(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
