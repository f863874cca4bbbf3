//! # Authentication Module
//!
//! Credential handling for the progress sync core.
//!
//! ## Overview
//!
//! - [`AuthGateway`]: the contract the sync core consumes (read the current
//!   credential, renew it, observe and flip the logged-in state)
//! - [`SessionManager`]: the concrete gateway with single-flight renewal
//!   against the service's refresh endpoint
//! - [`TokenStore`]: token persistence on top of the platform `SecureStore`

pub mod error;
pub mod gateway;
pub mod session;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use gateway::AuthGateway;
pub use session::SessionManager;
pub use token_store::TokenStore;
pub use types::{AuthTokens, CredentialState};
