//! # Core Configuration Module
//!
//! Provides configuration management for the progress sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings. It enforces
//! fail-fast validation so that missing bridges are reported before any
//! remote call or database access happens.
//!
//! ## Required Settings
//!
//! - `api_base_url` - Root of the remote progress/star service
//! - `database_path` - SQLite file backing the local store
//!
//! ## Bridges (with platform defaults)
//!
//! - `HttpClient` - Remote calls (desktop default: reqwest)
//! - `SecureStore` - Credential persistence (desktop default: OS keychain)
//! - `NotificationSink` - User-facing messages (desktop default: tracing)
//!
//! When the `desktop-shims` feature is disabled, each missing bridge produces
//! [`Error::CapabilityMissing`] with an actionable message.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com")
//!     .database_path("/path/to/progress.db")
//!     .max_merge_rounds(5)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, NotificationSink, SecureStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Folder starred items land in when the caller does not name one.
pub const DEFAULT_STAR_FOLDER: &str = "wrong";

/// Path of the credential refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/user/refresh";

/// Core configuration for the progress sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the remote service, without a trailing slash
    pub api_base_url: String,

    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Folder used by star operations that do not name one
    pub default_star_folder: String,

    /// Path of the refresh endpoint appended to `api_base_url`
    pub refresh_path: String,

    pub renewal_policy: RenewalPolicy,

    /// Upper bound on push-then-refetch rounds in a progress merge. Each push
    /// is followed by a verifying fetch, so 1 is a usable bound.
    pub max_merge_rounds: u32,

    /// Initial user settings
    pub user_settings: UserSettings,

    pub http_client: Arc<dyn HttpClient>,

    /// Secure credential storage
    pub secure_store: Arc<dyn SecureStore>,

    pub notification_sink: Arc<dyn NotificationSink>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("database_path", &self.database_path)
            .field("default_star_folder", &self.default_star_folder)
            .field("refresh_path", &self.refresh_path)
            .field("renewal_policy", &self.renewal_policy)
            .field("max_merge_rounds", &self.max_merge_rounds)
            .field("user_settings", &self.user_settings)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("notification_sink", &"NotificationSink { ... }")
            .finish()
    }
}

/// How many credential renewals a single logical operation may trigger.
///
/// The first remote attempt is free; every `Expired` answer consumes one
/// renewal. Once `max_renewals` renewals have been spent and the service
/// still reports expiry, the operation fails with a retry-exhausted error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalPolicy {
    pub max_renewals: u32,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self { max_renewals: 2 }
    }
}

impl RenewalPolicy {
    pub fn new(max_renewals: u32) -> Self {
        Self { max_renewals }
    }

    /// Total remote attempts a logical operation may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_renewals.saturating_add(1)
    }
}

/// Per-user preferences carried by the core.
///
/// Only `auto_sync_data` affects reconciliation: when it is off, a progress
/// fetch never pushes local-only records and the remote list simply replaces
/// the local one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub main_profession_subject: i64,
    pub auto_sync_data: bool,
    pub auto_save_progress: bool,
    pub auto_star_question: bool,
    pub show_user_stat: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            main_profession_subject: 1,
            auto_sync_data: true,
            auto_save_progress: true,
            auto_star_question: true,
            show_user_stat: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The base URL is an absolute http(s) URL
    /// - Database path is not empty
    /// - The default star folder has a name
    /// - The refresh path starts with `/`
    /// - Merge rounds and the renewal bound are non-zero
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.default_star_folder.trim().is_empty() {
            return Err(Error::Config(
                "Default star folder cannot be empty".to_string(),
            ));
        }

        if !self.refresh_path.starts_with('/') {
            return Err(Error::Config(format!(
                "Refresh path must start with '/', got '{}'",
                self.refresh_path
            )));
        }

        if self.max_merge_rounds == 0 {
            return Err(Error::Config(
                "Merge rounds must be greater than 0".to_string(),
            ));
        }

        if self.renewal_policy.max_renewals == 0 {
            return Err(Error::Config(
                "Renewal policy must allow at least one credential renewal".to_string(),
            ));
        }

        Ok(())
    }

    /// Joins `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required for remote sync. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Mobile/Web: inject the platform HTTP stack.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    let store: Arc<dyn SecureStore> = Arc::new(bridge_desktop::KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(capability_missing(
        "SecureStore",
        "SecureStore implementation is required for credential persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
         Mobile: inject platform-native secure storage (Keychain/Keystore).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    let sink: Arc<dyn NotificationSink> = Arc::new(bridge_desktop::TracingNotificationSink::new());
    Ok(sink)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notification_sink() -> Result<Arc<dyn NotificationSink>> {
    Err(capability_missing(
        "NotificationSink",
        "NotificationSink implementation is required to surface sync failures. \
         Desktop: enable the 'desktop-shims' feature to route notifications into tracing.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    database_path: Option<PathBuf>,
    default_star_folder: Option<String>,
    refresh_path: Option<String>,
    renewal_policy: Option<RenewalPolicy>,
    max_merge_rounds: Option<u32>,
    user_settings: Option<UserSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
}

impl CoreConfigBuilder {
    /// Sets the base URL of the remote service. A trailing `/` is dropped.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.api_base_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    /// Sets the database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/progress.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Default: `"wrong"`
    pub fn default_star_folder(mut self, folder: impl Into<String>) -> Self {
        self.default_star_folder = Some(folder.into());
        self
    }

    /// Default: `/user/refresh`
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    pub fn renewal_policy(mut self, policy: RenewalPolicy) -> Self {
        self.renewal_policy = Some(policy);
        self
    }

    /// Sets how many times a progress merge may push local-only records.
    ///
    /// Default: 3
    pub fn max_merge_rounds(mut self, rounds: u32) -> Self {
        self.max_merge_rounds = Some(rounds);
        self
    }

    pub fn user_settings(mut self, settings: UserSettings) -> Self {
        self.user_settings = Some(settings);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// The secure store persists the access and refresh tokens. It must
    /// provide platform-appropriate security (Keychain on macOS/iOS,
    /// Keystore on Android, etc.).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if a required setting is missing, a bridge is
    /// missing and no platform default is available, or a value fails
    /// [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self.api_base_url.ok_or_else(|| {
            Error::Config("API base URL is required. Use .api_base_url() to set it.".to_string())
        })?;

        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let notification_sink = match self.notification_sink {
            Some(sink) => sink,
            None => provide_default_notification_sink()?,
        };

        let config = CoreConfig {
            api_base_url,
            database_path,
            default_star_folder: self
                .default_star_folder
                .unwrap_or_else(|| DEFAULT_STAR_FOLDER.to_string()),
            refresh_path: self
                .refresh_path
                .unwrap_or_else(|| DEFAULT_REFRESH_PATH.to_string()),
            renewal_policy: self.renewal_policy.unwrap_or_default(),
            max_merge_rounds: self.max_merge_rounds.unwrap_or(3),
            user_settings: self.user_settings.unwrap_or_default(),
            http_client,
            secure_store,
            notification_sink,
        };

        config.validate()?;

        Ok(config)
    }
}
