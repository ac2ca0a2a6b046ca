use thiserror::Error;

/// A token, payload or message could not be decoded.
#[derive(Error, Debug)]
pub enum DecodeFault {
    #[error("Malformed token: {0}")]
    Token(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    Payload(String),
}
