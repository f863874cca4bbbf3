use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The service reports no credential for this session.
    #[error("No credential for this session")]
    CredentialMissing,

    /// The credential kept expiring after every allowed renewal.
    #[error("{operation} still reported an expired credential after {attempts} attempts")]
    RetryExhausted { operation: String, attempts: u32 },

    /// The service answered with a failure that is not about the credential.
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Transport error: {0}")]
    Transport(#[from] BridgeError),

    #[error("Malformed remote response: {0}")]
    Decode(String),

    #[error("Local store error: {0}")]
    Storage(#[from] LibraryError),

    /// Renewing the credential failed.
    #[error("Credential renewal failed: {0}")]
    Auth(#[from] AuthError),

    /// The local collection still held records the remote lacks after the
    /// last allowed round. Local data is left untouched.
    #[error("Merge incomplete after {rounds} fetches, {outstanding} records outstanding")]
    MergeIncomplete { rounds: u32, outstanding: usize },
}

impl SyncError {
    /// Whether the failure should reach the user-facing notification sink.
    ///
    /// A missing credential only means the session ended; the logout itself
    /// is the signal.
    pub fn should_notify(&self) -> bool {
        !matches!(self, SyncError::CredentialMissing)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_credential_is_silent() {
        assert!(!SyncError::CredentialMissing.should_notify());
        assert!(SyncError::Remote("server_error".into()).should_notify());
        assert!(SyncError::RetryExhausted {
            operation: "add_progress".into(),
            attempts: 3
        }
        .should_notify());
        assert!(SyncError::MergeIncomplete {
            rounds: 3,
            outstanding: 2
        }
        .should_notify());
    }

    #[test]
    fn test_display_mentions_attempts() {
        let err = SyncError::RetryExhausted {
            operation: "fetch_stars".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "fetch_stars still reported an expired credential after 3 attempts"
        );
    }
}
