//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, notifications) and the local SQLite store into a single
//! [`CoreService`]. Desktop apps typically enable the `desktop-shims` feature
//! (which depends on `bridge-desktop`) so that missing bridges fall back to
//! the reqwest, keyring and tracing defaults.
//!
//! Bootstrapping restores any persisted session, so the service starts in
//! online mode when a token pair survived the last run and in offline mode
//! otherwise.

pub mod error;

pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient, TracingNotificationSink};

use std::sync::Arc;

use bridge_traits::time::SystemClock;
use core_auth::{AuthGateway, AuthTokens, CredentialState, SessionManager, TokenStore};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{SqliteProgressRepository, SqliteStarRepository};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, Receiver};
use core_runtime::CoreEvent;
use core_sync::{HttpRemoteClient, SyncCoordinator, SyncDependencies, SyncOptions};
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    session: Arc<SessionManager>,
    coordinator: Arc<SyncCoordinator>,
    event_bus: EventBus,
}

impl CoreService {
    /// Build a service from a validated configuration, using the SQLite file
    /// named by `config.database_path`.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let database = DatabaseConfig::new(config.database_path.clone());
        Self::bootstrap_with_database(config, database).await
    }

    /// Build a service against an explicit database configuration.
    #[instrument(skip_all, fields(api = %config.api_base_url))]
    pub async fn bootstrap_with_database(
        config: CoreConfig,
        database: DatabaseConfig,
    ) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(database).await?;
        let event_bus = EventBus::default();

        let session = Arc::new(SessionManager::new(
            TokenStore::new(config.secure_store.clone()),
            config.http_client.clone(),
            event_bus.clone(),
            config.endpoint(&config.refresh_path),
        ));
        let state = session.restore().await?;

        let remote = Arc::new(HttpRemoteClient::new(
            config.http_client.clone(),
            config.api_base_url.clone(),
        ));

        let coordinator = SyncCoordinator::new(
            SyncDependencies {
                progress_store: Arc::new(SqliteProgressRepository::new(pool.clone())),
                star_store: Arc::new(SqliteStarRepository::new(pool)),
                remote,
                auth: session.clone(),
                notifier: config.notification_sink.clone(),
                clock: Arc::new(SystemClock),
                event_bus: Arc::new(event_bus.clone()),
            },
            SyncOptions::from_config(&config),
        );

        info!(%state, "Core service ready");
        Ok(Self {
            session,
            coordinator: Arc::new(coordinator),
            event_bus,
        })
    }

    pub fn sync(&self) -> Arc<SyncCoordinator> {
        self.coordinator.clone()
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to auth and sync events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub async fn credential_state(&self) -> CredentialState {
        self.session.credential_state().await
    }

    /// Enter online mode with a freshly issued token pair, then reconcile.
    ///
    /// The progress merge and the star fetch report their own failures
    /// through the notification sink; only the sign-in itself can fail here.
    pub async fn sign_in(&self, tokens: AuthTokens) -> Result<()> {
        self.session.sign_in(tokens).await?;

        if !self.coordinator.fetch_and_merge().await {
            warn!("Progress reconciliation after sign-in did not complete");
        }
        if !self.coordinator.fetch_stars().await {
            warn!("Star fetch after sign-in did not complete");
        }
        Ok(())
    }

    /// Return to offline mode. Local data is kept.
    pub async fn sign_out(&self) -> Result<()> {
        self.session.sign_out().await?;
        Ok(())
    }
}

/// Bootstrap with the desktop bridges and default settings.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// let service = core_service::bootstrap_desktop(
///     "https://api.example.com",
///     "/var/lib/app/progress.db",
/// )
/// .await?;
/// service.sync().add_progress("q1", 1, 2, 3).await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    api_base_url: impl Into<String>,
    database_path: impl Into<std::path::PathBuf>,
) -> Result<CoreService> {
    let config = CoreConfig::builder()
        .api_base_url(api_base_url)
        .database_path(database_path)
        .build()?;
    CoreService::bootstrap(config).await
}
