//! # Session Manager
//!
//! The concrete [`AuthGateway`]: owns the credential state, persists tokens
//! through [`TokenStore`] and renews the access token against the service's
//! refresh endpoint.
//!
//! ## Renewal
//!
//! Renewal is single-flight. Callers pass the token the service rejected and
//! queue on the renewal lock; once a caller holds the lock, a rejected token
//! that has already been replaced means someone else renewed, and it returns
//! immediately. While a renewal runs the state is
//! [`CredentialState::Refreshing`], which makes
//! [`AuthGateway::mark_logged_out`] a no-op.
//!
//! Sign-in and sign-out win over an in-flight renewal: its result is dropped
//! when the session was replaced or ended while the refresh request ran.
//!
//! ## Events
//!
//! `SignedIn`, `SignedOut`, `TokenRefreshing`, `TokenRefreshed` and
//! `AuthError` are published on the [`EventBus`]. Emission is best-effort.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, SignOutReason};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::gateway::AuthGateway;
use crate::token_store::TokenStore;
use crate::types::{AuthTokens, CredentialState};

#[derive(Debug, Default)]
struct SessionState {
    state: CredentialState,
    access_token: Option<String>,
    /// Bumped by every sign-in and sign-out. A renewal that started under an
    /// older generation must not commit its result.
    generation: u64,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshEnvelope {
    code: i64,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RefreshedTokens {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct SessionManager {
    token_store: TokenStore,
    http_client: Arc<dyn HttpClient>,
    event_bus: EventBus,
    refresh_url: String,
    session: RwLock<SessionState>,
    renew_lock: Mutex<()>,
}

impl SessionManager {
    /// Create a logged-out session manager.
    ///
    /// `refresh_url` is the absolute URL of the refresh endpoint.
    pub fn new(
        token_store: TokenStore,
        http_client: Arc<dyn HttpClient>,
        event_bus: EventBus,
        refresh_url: impl Into<String>,
    ) -> Self {
        Self {
            token_store,
            http_client,
            event_bus,
            refresh_url: refresh_url.into(),
            session: RwLock::new(SessionState::default()),
            renew_lock: Mutex::new(()),
        }
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    /// Resume a persisted session.
    ///
    /// The session is logged in iff a complete token pair is stored.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<CredentialState> {
        let tokens = match self.token_store.retrieve_tokens().await {
            Ok(tokens) => tokens,
            Err(AuthError::TokenCorrupted { reason }) => {
                warn!(%reason, "Discarded corrupted session tokens");
                None
            }
            Err(e) => return Err(e),
        };

        let mut session = self.session.write().await;
        match tokens {
            Some(tokens) if !tokens.access_token.is_empty() && !tokens.refresh_token.is_empty() => {
                session.state = CredentialState::LoggedIn;
                session.access_token = Some(tokens.access_token);
            }
            _ => {
                session.state = CredentialState::LoggedOut;
                session.access_token = None;
            }
        }

        info!(state = %session.state, "Session restored");
        Ok(session.state)
    }

    /// Persist a freshly issued token pair and enter the logged-in state.
    #[instrument(skip(self, tokens))]
    pub async fn sign_in(&self, tokens: AuthTokens) -> Result<()> {
        {
            let mut session = self.session.write().await;
            self.token_store.store_tokens(&tokens).await?;
            session.generation += 1;
            session.state = CredentialState::LoggedIn;
            session.access_token = Some(tokens.access_token);
        }

        info!("Signed in");
        self.emit(AuthEvent::SignedIn);
        Ok(())
    }

    /// Forget the stored tokens and enter the logged-out state.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        {
            let mut session = self.session.write().await;
            self.token_store.delete_tokens().await?;
            session.generation += 1;
            session.state = CredentialState::LoggedOut;
            session.access_token = None;
        }

        info!("Signed out");
        self.emit(AuthEvent::SignedOut {
            reason: SignOutReason::UserRequested,
        });
        Ok(())
    }

    async fn request_renewal(&self, refresh_token: &str) -> Result<AuthTokens> {
        let request = HttpRequest::post(self.refresh_url.as_str())
            .json(&RefreshRequest { refresh_token })
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

        parse_refresh_response(&response, refresh_token)
    }

    async fn renew_locked(&self) -> Result<()> {
        let tokens = self
            .token_store
            .retrieve_tokens()
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        let (previous, generation) = {
            let mut session = self.session.write().await;
            let previous = session.state;
            session.state = CredentialState::Refreshing;
            (previous, session.generation)
        };
        self.emit(AuthEvent::TokenRefreshing);
        debug!("Requesting credential renewal");

        let outcome = self.request_renewal(&tokens.refresh_token).await;

        // Held until the renewed pair is stored, so a sign-out cannot slip
        // between the generation check and the write.
        let mut session = self.session.write().await;
        if session.generation != generation {
            drop(session);
            info!("Session changed during renewal, result discarded");
            return Ok(());
        }

        match outcome {
            Ok(renewed) => {
                if let Err(e) = self.token_store.store_tokens(&renewed).await {
                    session.state = previous;
                    return Err(e);
                }
                session.state = CredentialState::LoggedIn;
                session.access_token = Some(renewed.access_token);
                drop(session);

                info!("Credential renewed");
                self.emit(AuthEvent::TokenRefreshed);
                Ok(())
            }
            Err(e) => {
                let rejected = matches!(e, AuthError::RenewalRejected(_));
                session.state = if rejected {
                    CredentialState::LoggedOut
                } else {
                    previous
                };
                drop(session);

                warn!(error = %e, rejected, "Credential renewal failed");
                self.emit(AuthEvent::AuthError {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                if rejected {
                    self.emit(AuthEvent::SignedOut {
                        reason: SignOutReason::RenewalRejected,
                    });
                }
                Err(e)
            }
        }
    }
}

fn parse_refresh_response(response: &HttpResponse, old_refresh: &str) -> Result<AuthTokens> {
    let envelope: RefreshEnvelope = match response.json() {
        Ok(envelope) => envelope,
        Err(e) if response.is_success() => {
            return Err(AuthError::TokenRefreshFailed(format!(
                "malformed refresh response: {}",
                e
            )))
        }
        Err(_) => {
            return Err(AuthError::TokenRefreshFailed(format!(
                "HTTP {}",
                response.status
            )))
        }
    };

    if envelope.code != 200 {
        let reason = envelope
            .data
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("code {}", envelope.code));
        return Err(AuthError::RenewalRejected(reason));
    }

    let refreshed: RefreshedTokens = serde_json::from_value(envelope.data).map_err(|e| {
        AuthError::TokenRefreshFailed(format!("malformed refresh payload: {}", e))
    })?;

    Ok(AuthTokens {
        access_token: refreshed.token,
        refresh_token: refreshed
            .refresh_token
            .unwrap_or_else(|| old_refresh.to_string()),
    })
}

#[async_trait]
impl AuthGateway for SessionManager {
    async fn read_credential(&self) -> Option<String> {
        let session = self.session.read().await;
        if session.state.is_logged_in() {
            session.access_token.clone()
        } else {
            None
        }
    }

    #[instrument(skip_all)]
    async fn renew_credential(&self, rejected: &str) -> Result<()> {
        let _guard = self.renew_lock.lock().await;

        let current = self.session.read().await.access_token.clone();
        if current.is_some_and(|token| token != rejected) {
            debug!("Credential already renewed by a concurrent caller");
            return Ok(());
        }

        self.renew_locked().await
    }

    async fn credential_state(&self) -> CredentialState {
        self.session.read().await.state
    }

    async fn mark_logged_out(&self) {
        let mut session = self.session.write().await;
        let current = session.state;
        match current {
            CredentialState::Refreshing => {
                debug!("Ignoring logout signal while renewing");
            }
            CredentialState::LoggedOut => {}
            CredentialState::LoggedIn => {
                session.state = CredentialState::LoggedOut;
                drop(session);
                warn!("Service reported no credential; session logged out");
                self.emit(AuthEvent::SignedOut {
                    reason: SignOutReason::CredentialMissing,
                });
            }
        }
    }
}
