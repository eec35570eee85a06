use thiserror::Error;

/// Failures of one diagnosis batch.
///
/// `RateLimited` and `CredentialExpired` are absorbed by the relay's retry
/// policy; every other variant aborts the batch.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("no images were submitted")]
    EmptyBatch,
    #[error("classifier response is malformed: {0}")]
    MalformedUpstreamResponse(String),
    #[error("failed to acquire access token: {0}")]
    AuthFailure(String),
    #[error("classifier is rate limiting requests")]
    RateLimited,
    #[error("access token was rejected by the classifier")]
    CredentialExpired,
    #[error("retry limit of {0} exceeded")]
    RetryLimitExceeded(u32),
    #[error("classifier request failed: {0}")]
    OtherClassifierFailure(String),
}

impl RelayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::RateLimited | RelayError::CredentialExpired)
    }
}
