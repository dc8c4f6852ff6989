use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Only transport failures are worth retrying within the same cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}
