//! Secure Token Storage
//!
//! Persists the session's access and refresh tokens through the platform
//! [`SecureStore`]. Tokens are stored as one JSON document under a single key
//! so that a partially written pair can never be observed.
//!
//! ```no_run
//! use core_auth::{AuthTokens, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! token_store.store_tokens(&AuthTokens::new("access", "refresh")).await?;
//! let restored = token_store.retrieve_tokens().await?;
//! assert!(restored.is_some());
//!
//! token_store.delete_tokens().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::AuthTokens;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_KEY: &str = "progress_sync:session_tokens";

/// Secure storage for the session tokens.
///
/// Token values are never logged. A document that no longer deserializes is
/// deleted and reported as [`AuthError::TokenCorrupted`].
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
    key: String,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::with_key(secure_store, DEFAULT_KEY)
    }

    /// Use a custom storage key, e.g. to keep several accounts apart.
    pub fn with_key(secure_store: Arc<dyn SecureStore>, key: impl Into<String>) -> Self {
        Self {
            secure_store,
            key: key.into(),
        }
    }

    /// Store tokens, overwriting any previous pair.
    pub async fn store_tokens(&self, tokens: &AuthTokens) -> Result<()> {
        let json = serde_json::to_vec(tokens).map_err(|e| AuthError::SerializationFailed {
            context: "session tokens".to_string(),
            source: e,
        })?;

        self.secure_store
            .set_secret(&self.key, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store tokens in secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!("Session tokens stored");
        Ok(())
    }

    /// Retrieve the stored tokens.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    pub async fn retrieve_tokens(&self) -> Result<Option<AuthTokens>> {
        let data = self.secure_store.get_secret(&self.key).await.map_err(|e| {
            warn!(error = %e, "Failed to retrieve tokens from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!("No session tokens in storage");
            return Ok(None);
        };

        match serde_json::from_slice::<AuthTokens>(&data) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!(error = %e, "Stored tokens are corrupted, deleting them");

                if let Err(delete_err) = self.secure_store.delete_secret(&self.key).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token data");
                }

                Err(AuthError::TokenCorrupted {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Delete the stored tokens. Idempotent.
    pub async fn delete_tokens(&self) -> Result<()> {
        self.secure_store
            .delete_secret(&self.key)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete tokens from secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!("Session tokens deleted");
        Ok(())
    }

    pub async fn has_tokens(&self) -> Result<bool> {
        self.secure_store
            .has_secret(&self.key)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }
}
