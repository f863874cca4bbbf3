//! Shared fakes for the reconciliation integration tests.
//!
//! - `FakeRemote` keeps both remote collections in memory and can be scripted
//!   to answer the next calls with credential or transport failures
//! - `FakeGateway` hands out numbered tokens and counts renewals
//! - `RecordingNotifier` keeps every user-facing message

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::notify::{Notification, NotificationSink};
use bridge_traits::time::FixedClock;
use chrono::{TimeZone, Utc};
use core_auth::{AuthGateway, CredentialState};
use core_library::db::create_test_pool;
use core_library::{ItemRecord, SqliteProgressRepository, SqliteStarRepository};
use core_runtime::events::{CoreEvent, EventBus};
use core_sync::{
    RemoteClient, RemoteOutcome, RemoteResource, SyncCoordinator, SyncDependencies, SyncError,
    SyncOptions,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::Receiver;

// ============================================================================
// Remote
// ============================================================================

/// A canned answer for the next remote call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Expired,
    Missing,
    Failed(&'static str),
    Transport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub resource: RemoteResource,
    pub token: String,
    pub pids: Vec<String>,
}

#[derive(Default)]
pub struct FakeRemote {
    progress: Mutex<Vec<ItemRecord>>,
    stars: Mutex<Vec<ItemRecord>>,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Call>>,
    ignore_pushes: AtomicBool,
}

impl FakeRemote {
    fn collection(&self, resource: RemoteResource) -> &Mutex<Vec<ItemRecord>> {
        match resource {
            RemoteResource::Progress => &self.progress,
            RemoteResource::Star => &self.stars,
        }
    }

    pub fn seed(&self, resource: RemoteResource, records: Vec<ItemRecord>) {
        *self.collection(resource).lock().unwrap() = records;
    }

    pub fn pids(&self, resource: RemoteResource) -> Vec<String> {
        self.collection(resource)
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.pid.clone())
            .collect()
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = Scripted>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    /// Acknowledge pushes without storing them.
    pub fn ignore_pushes(&self) {
        self.ignore_pushes.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    fn begin<T>(
        &self,
        op: &'static str,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> Option<core_sync::Result<RemoteOutcome<T>>> {
        self.calls.lock().unwrap().push(Call {
            op,
            resource,
            token: token.to_string(),
            pids: pids.to_vec(),
        });

        let scripted = self.script.lock().unwrap().pop_front()?;
        Some(match scripted {
            Scripted::Expired => Ok(RemoteOutcome::Expired),
            Scripted::Missing => Ok(RemoteOutcome::MissingCredential),
            Scripted::Failed(kind) => Ok(RemoteOutcome::Failed(kind.to_string())),
            Scripted::Transport => Err(SyncError::Transport(BridgeError::OperationFailed(
                "connection reset".to_string(),
            ))),
        })
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn fetch(
        &self,
        resource: RemoteResource,
        token: &str,
    ) -> core_sync::Result<RemoteOutcome<Vec<ItemRecord>>> {
        if let Some(scripted) = self.begin("fetch", resource, token, &[]) {
            return scripted;
        }
        Ok(RemoteOutcome::Ok(
            self.collection(resource).lock().unwrap().clone(),
        ))
    }

    async fn push(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> core_sync::Result<RemoteOutcome<()>> {
        if let Some(scripted) = self.begin("push", resource, token, pids) {
            return scripted;
        }
        if !self.ignore_pushes.load(Ordering::SeqCst) {
            let mut stored = self.collection(resource).lock().unwrap();
            for pid in pids {
                if !stored.iter().any(|r| &r.pid == pid) {
                    stored.push(ItemRecord {
                        pid: pid.clone(),
                        course: None,
                        subject: None,
                        kind: None,
                        time: None,
                    });
                }
            }
        }
        Ok(RemoteOutcome::Ok(()))
    }

    async fn delete(
        &self,
        resource: RemoteResource,
        token: &str,
        pids: &[String],
    ) -> core_sync::Result<RemoteOutcome<()>> {
        if let Some(scripted) = self.begin("delete", resource, token, pids) {
            return scripted;
        }
        self.collection(resource)
            .lock()
            .unwrap()
            .retain(|r| !pids.contains(&r.pid));
        Ok(RemoteOutcome::Ok(()))
    }
}

// ============================================================================
// Auth
// ============================================================================

pub struct FakeGateway {
    state: Mutex<CredentialState>,
    token: Mutex<Option<String>>,
    renewals: AtomicU32,
}

impl FakeGateway {
    pub fn new(logged_in: bool) -> Self {
        let gateway = Self {
            state: Mutex::new(CredentialState::LoggedOut),
            token: Mutex::new(None),
            renewals: AtomicU32::new(0),
        };
        if logged_in {
            gateway.log_in();
        }
        gateway
    }

    pub fn log_in(&self) {
        *self.state.lock().unwrap() = CredentialState::LoggedIn;
        *self.token.lock().unwrap() = Some("token-0".to_string());
    }

    pub fn set_state(&self, state: CredentialState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn state(&self) -> CredentialState {
        *self.state.lock().unwrap()
    }

    pub fn renewals(&self) -> u32 {
        self.renewals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthGateway for FakeGateway {
    async fn read_credential(&self) -> Option<String> {
        if self.state() == CredentialState::LoggedOut {
            return None;
        }
        self.token.lock().unwrap().clone()
    }

    async fn renew_credential(&self, _rejected: &str) -> core_auth::Result<()> {
        let n = self.renewals.fetch_add(1, Ordering::SeqCst) + 1;
        *self.token.lock().unwrap() = Some(format!("token-{}", n));
        Ok(())
    }

    async fn credential_state(&self) -> CredentialState {
        self.state()
    }

    async fn mark_logged_out(&self) {
        let mut state = self.state.lock().unwrap();
        if *state != CredentialState::Refreshing {
            *state = CredentialState::LoggedOut;
            *self.token.lock().unwrap() = None;
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> BridgeResult<()> {
        self.messages.lock().unwrap().push(notification);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: SyncCoordinator,
    pub remote: Arc<FakeRemote>,
    pub auth: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub progress_store: Arc<SqliteProgressRepository>,
    pub star_store: Arc<SqliteStarRepository>,
    pub events: Arc<EventBus>,
}

pub async fn harness(logged_in: bool) -> Harness {
    harness_with(logged_in, SyncOptions::default()).await
}

pub async fn harness_with(logged_in: bool, options: SyncOptions) -> Harness {
    let pool = create_test_pool().await.expect("in-memory pool");
    let progress_store = Arc::new(SqliteProgressRepository::new(pool.clone()));
    let star_store = Arc::new(SqliteStarRepository::new(pool));
    let remote = Arc::new(FakeRemote::default());
    let auth = Arc::new(FakeGateway::new(logged_in));
    let notifier = Arc::new(RecordingNotifier::default());
    let events = Arc::new(EventBus::new(64));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));

    let coordinator = SyncCoordinator::new(
        SyncDependencies {
            progress_store: progress_store.clone(),
            star_store: star_store.clone(),
            remote: remote.clone(),
            auth: auth.clone(),
            notifier: notifier.clone(),
            clock,
            event_bus: events.clone(),
        },
        options,
    );

    Harness {
        coordinator,
        remote,
        auth,
        notifier,
        progress_store,
        star_store,
        events,
    }
}

pub fn pids(records: &[ItemRecord]) -> Vec<&str> {
    records.iter().map(|r| r.pid.as_str()).collect()
}

pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
