use thiserror::Error;

/// A remote operation could not complete.
#[derive(Error, Debug)]
pub enum NetworkFault {
    /// Connection refused, reset, DNS failure and the like.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The bounded request timeout elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response or request body could not be (de)serialized.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl NetworkFault {
    /// Worth another attempt within the same call.
    pub fn is_transient(&self) -> bool {
        matches!(self, NetworkFault::Transport(_) | NetworkFault::Timeout)
    }
}

impl From<reqwest::Error> for NetworkFault {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkFault::Timeout
        } else if e.is_decode() {
            NetworkFault::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            NetworkFault::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            NetworkFault::Transport(e.to_string())
        }
    }
}
