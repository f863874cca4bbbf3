use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Failed to serialize {context}: {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored credentials are corrupted: {reason}")]
    TokenCorrupted { reason: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Transport-level failure while talking to the refresh endpoint.
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The service answered the refresh request with a non-success code.
    #[error("Token renewal rejected by the service: {0}")]
    RenewalRejected(String),
}

impl AuthError {
    /// Whether retrying the renewal later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::TokenRefreshFailed(_) | AuthError::SecureStorageUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
