//! # Sync Coordinator
//!
//! The entry point for every progress and star operation.
//!
//! Each operation comes in two forms:
//!
//! - `try_*` returns the full [`Result`], for callers that want to react to
//!   specific failures.
//! - The plain form is a guarded boundary. A failure is logged, reported to
//!   the [`NotificationSink`] (unless it is only a missing credential) and
//!   broadcast as [`SyncEvent::Failed`]. The caller then gets a neutral
//!   value: `false` for mutations and checks, an empty list for reads.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncCoordinator, SyncDependencies, SyncOptions};
//!
//! let coordinator = SyncCoordinator::new(deps, SyncOptions::from_config(&config));
//!
//! // Offline or online, the call shape is the same.
//! coordinator.add_progress("q-102", 1, 3, 2).await;
//!
//! // After login, push local-only records and adopt the remote list.
//! coordinator.fetch_and_merge().await;
//! ```

use crate::context::SyncContext;
use crate::counter::{CounterSnapshot, Curriculum, ProgressCounter};
use crate::error::{Result, SyncError};
use crate::progress::{MergeReport, ProgressSync};
use crate::remote::RemoteClient;
use crate::star::StarSync;
use bridge_traits::notify::{Notification, NotificationSink};
use bridge_traits::time::Clock;
use core_auth::AuthGateway;
use core_library::{ProgressRecord, ProgressRepository, StarRecord, StarRepository, SubjectFilter};
use core_runtime::config::{CoreConfig, DEFAULT_STAR_FOLDER};
use core_runtime::events::{EventBus, SyncEvent};
use core_runtime::{RenewalPolicy, UserSettings};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Collaborators injected into the coordinator.
pub struct SyncDependencies {
    pub progress_store: Arc<dyn ProgressRepository>,
    pub star_store: Arc<dyn StarRepository>,
    pub remote: Arc<dyn RemoteClient>,
    pub auth: Arc<dyn AuthGateway>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
}

/// Tunables of the reconciliation engine.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub default_star_folder: String,
    pub renewal_policy: RenewalPolicy,
    pub max_merge_rounds: u32,
    pub user_settings: UserSettings,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            default_star_folder: DEFAULT_STAR_FOLDER.to_string(),
            renewal_policy: RenewalPolicy::default(),
            max_merge_rounds: 3,
            user_settings: UserSettings::default(),
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            default_star_folder: config.default_star_folder.clone(),
            renewal_policy: config.renewal_policy,
            max_merge_rounds: config.max_merge_rounds,
            user_settings: config.user_settings.clone(),
        }
    }
}

pub struct SyncCoordinator {
    ctx: Arc<SyncContext>,
    progress: ProgressSync,
    stars: StarSync,
    counter: Arc<ProgressCounter>,
    notifier: Arc<dyn NotificationSink>,
    settings: RwLock<UserSettings>,
}

impl SyncCoordinator {
    pub fn new(deps: SyncDependencies, options: SyncOptions) -> Self {
        let ctx = Arc::new(SyncContext {
            remote: deps.remote,
            auth: deps.auth,
            clock: deps.clock,
            event_bus: deps.event_bus,
            renewal_policy: options.renewal_policy,
        });
        let counter = Arc::new(ProgressCounter::new());

        Self {
            progress: ProgressSync::new(
                ctx.clone(),
                deps.progress_store,
                counter.clone(),
                options.max_merge_rounds,
            ),
            stars: StarSync::new(ctx.clone(), deps.star_store, options.default_star_folder),
            ctx,
            counter,
            notifier: deps.notifier,
            settings: RwLock::new(options.user_settings),
        }
    }

    // ------------------------------------------------------------------
    // Settings and counter
    // ------------------------------------------------------------------

    pub async fn settings(&self) -> UserSettings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: UserSettings) {
        debug!(auto_sync_data = settings.auto_sync_data, "User settings updated");
        *self.settings.write().await = settings;
    }

    pub fn counter(&self) -> CounterSnapshot {
        self.counter.snapshot()
    }

    pub fn default_star_folder(&self) -> &str {
        self.stars.default_folder()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.ctx.is_logged_in().await
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn try_fetch_and_merge(&self) -> Result<MergeReport> {
        let push_local_only = self.settings.read().await.auto_sync_data;
        self.progress.fetch_and_merge(push_local_only).await
    }

    pub async fn fetch_and_merge(&self) -> bool {
        self.guarded("fetch progress", self.try_fetch_and_merge())
            .await
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn try_add_progress(
        &self,
        pid: &str,
        course: i64,
        subject: i64,
        kind: i64,
    ) -> Result<bool> {
        self.progress.add(pid, course, subject, kind).await
    }

    pub async fn add_progress(&self, pid: &str, course: i64, subject: i64, kind: i64) -> bool {
        self.guarded(
            "add progress",
            self.try_add_progress(pid, course, subject, kind),
        )
        .await
        .is_some()
    }

    #[instrument(skip(self, pids), fields(count = pids.len()))]
    pub async fn try_add_progress_batch(&self, pids: &[String]) -> Result<usize> {
        self.progress.add_batch(pids).await
    }

    pub async fn add_progress_batch(&self, pids: &[String]) -> bool {
        self.guarded("add progress", self.try_add_progress_batch(pids))
            .await
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn try_delete_progress(&self, pid: &str) -> Result<bool> {
        self.progress.delete(pid).await
    }

    pub async fn delete_progress(&self, pid: &str) -> bool {
        self.guarded("delete progress", self.try_delete_progress(pid))
            .await
            .is_some()
    }

    pub async fn try_has_progress(&self, pid: &str) -> Result<bool> {
        self.progress.has_progress(pid).await
    }

    pub async fn has_progress(&self, pid: &str) -> bool {
        self.guarded("check progress", self.try_has_progress(pid))
            .await
            .unwrap_or(false)
    }

    pub async fn try_get_all_progress(&self) -> Result<Vec<ProgressRecord>> {
        self.progress.get_all().await
    }

    pub async fn get_all_progress(&self) -> Vec<ProgressRecord> {
        self.guarded("read progress", self.try_get_all_progress())
            .await
            .unwrap_or_default()
    }

    /// `subject` and `kind` accept [`core_library::ANY`].
    pub async fn try_get_progress_by_subject(
        &self,
        course: i64,
        subject: i64,
        kind: i64,
    ) -> Result<Vec<ProgressRecord>> {
        self.progress
            .get_by_subject(SubjectFilter::new(course, subject, kind))
            .await
    }

    pub async fn get_progress_by_subject(
        &self,
        course: i64,
        subject: i64,
        kind: i64,
    ) -> Vec<ProgressRecord> {
        self.guarded(
            "read progress",
            self.try_get_progress_by_subject(course, subject, kind),
        )
        .await
        .unwrap_or_default()
    }

    #[instrument(skip(self))]
    pub async fn try_update_counter(&self, curriculum: Curriculum) -> Result<CounterSnapshot> {
        self.progress.update_counter(curriculum).await
    }

    /// Recount the progress counter. On failure the previous value is kept.
    pub async fn update_counter(&self, curriculum: Curriculum) -> CounterSnapshot {
        let fallback = self.counter.snapshot();
        self.guarded("count progress", self.try_update_counter(curriculum))
            .await
            .unwrap_or(fallback)
    }

    // ------------------------------------------------------------------
    // Stars
    // ------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn try_fetch_stars(&self) -> Result<usize> {
        self.stars.fetch_stars().await
    }

    pub async fn fetch_stars(&self) -> bool {
        self.guarded("fetch stars", self.try_fetch_stars())
            .await
            .is_some()
    }

    pub async fn try_is_starred(&self, pid: &str) -> Result<bool> {
        self.stars.is_starred(pid).await
    }

    pub async fn is_starred(&self, pid: &str) -> bool {
        self.guarded("check star", self.try_is_starred(pid))
            .await
            .unwrap_or(false)
    }

    pub async fn try_is_starred_in(&self, pid: &str, folder: &str) -> Result<bool> {
        self.stars.is_starred_in(pid, folder).await
    }

    pub async fn is_starred_in(&self, pid: &str, folder: &str) -> bool {
        self.guarded("check star", self.try_is_starred_in(pid, folder))
            .await
            .unwrap_or(false)
    }

    #[instrument(skip(self))]
    pub async fn try_add_star(
        &self,
        pid: &str,
        course: i64,
        subject: i64,
        kind: i64,
    ) -> Result<bool> {
        self.stars.add_star(pid, course, subject, kind).await
    }

    pub async fn add_star(&self, pid: &str, course: i64, subject: i64, kind: i64) -> bool {
        self.guarded("add star", self.try_add_star(pid, course, subject, kind))
            .await
            .is_some()
    }

    #[instrument(skip(self))]
    pub async fn try_remove_star(&self, pid: &str) -> Result<bool> {
        self.stars.remove_star(pid).await
    }

    pub async fn remove_star(&self, pid: &str) -> bool {
        self.guarded("remove star", self.try_remove_star(pid))
            .await
            .is_some()
    }

    /// `None` reads the default folder.
    pub async fn try_get_folder(&self, folder: Option<&str>) -> Result<Vec<StarRecord>> {
        let folder = folder.unwrap_or(self.stars.default_folder());
        self.stars.get_folder(folder).await
    }

    pub async fn get_folder(&self, folder: Option<&str>) -> Vec<StarRecord> {
        self.guarded("read stars", self.try_get_folder(folder))
            .await
            .unwrap_or_default()
    }

    pub async fn try_get_folder_by_subject(
        &self,
        course: i64,
        subject: i64,
        kind: i64,
        folder: Option<&str>,
    ) -> Result<Vec<StarRecord>> {
        let folder = folder.unwrap_or(self.stars.default_folder());
        self.stars
            .get_folder_by_subject(SubjectFilter::new(course, subject, kind), folder)
            .await
    }

    pub async fn get_folder_by_subject(
        &self,
        course: i64,
        subject: i64,
        kind: i64,
        folder: Option<&str>,
    ) -> Vec<StarRecord> {
        self.guarded(
            "read stars",
            self.try_get_folder_by_subject(course, subject, kind, folder),
        )
        .await
        .unwrap_or_default()
    }

    pub async fn try_list_folders(&self) -> Result<Vec<String>> {
        self.stars.list_folders().await
    }

    pub async fn list_folders(&self) -> Vec<String> {
        self.guarded("list star folders", self.try_list_folders())
            .await
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Failure boundary
    // ------------------------------------------------------------------

    /// Await `operation`, reporting a failure instead of returning it.
    ///
    /// `None` on failure, after the failure has been reported.
    async fn guarded<T, Fut>(&self, operation: &'static str, fut: Fut) -> Option<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match fut.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.report_failure(operation, &err).await;
                None
            }
        }
    }

    async fn report_failure(&self, operation: &'static str, err: &SyncError) {
        let message = format!("Failed to {}: {}", operation, err);

        if err.should_notify() {
            warn!(operation, error = %err, "Sync operation failed");
            if let Err(e) = self.notifier.notify(Notification::failed(&message)).await {
                debug!(error = %e, "Notification sink rejected failure message");
            }
        } else {
            info!(operation, "Sync operation skipped, no credential on the remote");
        }

        self.ctx.emit(SyncEvent::Failed {
            operation: operation.to_string(),
            message,
        });
    }
}
