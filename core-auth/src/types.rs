use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the session stands with respect to the remote service.
///
/// `Refreshing` counts as logged in: remote calls are still attempted, and a
/// "credential missing" answer observed during a renewal is not taken as a
/// logout.
///
/// ```
/// use core_auth::CredentialState;
///
/// assert!(CredentialState::Refreshing.is_logged_in());
/// assert!(!CredentialState::LoggedOut.is_logged_in());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    LoggedOut,
    LoggedIn,
    Refreshing,
}

impl CredentialState {
    pub fn is_logged_in(&self) -> bool {
        !matches!(self, CredentialState::LoggedOut)
    }
}

impl Default for CredentialState {
    fn default() -> Self {
        CredentialState::LoggedOut
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialState::LoggedOut => "logged_out",
            CredentialState::LoggedIn => "logged_in",
            CredentialState::Refreshing => "refreshing",
        };
        f.write_str(name)
    }
}

/// Bearer token plus the refresh token used to renew it.
///
/// Token values never appear in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}
