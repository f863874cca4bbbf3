//! # Progress Reconciliation
//!
//! Keeps the local progress collection consistent with the remote one.
//!
//! While logged out every mutation is local only and cannot fail on the
//! remote side. While logged in a mutation is applied locally only after the
//! remote acknowledged it.
//!
//! A fetch treats the remote list as authoritative once it holds at least
//! as many records as the local collection. Until then the local-only
//! records are pushed and the fetch is repeated. `max_merge_rounds` bounds
//! the number of pushes; every push is followed by a verifying fetch.
//!
//! Remote records without a usable `pid` are dropped before they reach the
//! store.

use crate::context::SyncContext;
use crate::counter::{CounterSnapshot, Curriculum, ProgressCounter};
use crate::error::{Result, SyncError};
use crate::remote::{discard_invalid, RemoteResource};
use core_library::{ItemRecord, ProgressRecord, ProgressRepository, SubjectFilter};
use core_runtime::events::SyncEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a converged fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Remote fetches performed, including the verifying ones.
    pub rounds: u32,
    /// Local-only records pushed to the remote.
    pub pushed: usize,
    /// Size of the local collection afterwards.
    pub records: usize,
}

pub struct ProgressSync {
    ctx: Arc<SyncContext>,
    store: Arc<dyn ProgressRepository>,
    counter: Arc<ProgressCounter>,
    max_merge_rounds: u32,
}

impl ProgressSync {
    pub fn new(
        ctx: Arc<SyncContext>,
        store: Arc<dyn ProgressRepository>,
        counter: Arc<ProgressCounter>,
        max_merge_rounds: u32,
    ) -> Self {
        Self {
            ctx,
            store,
            counter,
            max_merge_rounds: max_merge_rounds.max(1),
        }
    }

    /// Pull the remote list and reconcile the local collection with it.
    ///
    /// With `push_local_only` off the remote list simply replaces the local
    /// collection.
    pub async fn fetch_and_merge(&self, push_local_only: bool) -> Result<MergeReport> {
        let mut pushed = 0;
        let mut push_rounds = 0;
        let mut round = 0;

        loop {
            round += 1;
            let remote = self
                .ctx
                .call("fetch_progress", |token| {
                    let client = self.ctx.remote.clone();
                    async move { client.fetch(RemoteResource::Progress, &token).await }
                })
                .await?;
            let remote = discard_invalid(RemoteResource::Progress, remote);

            if push_local_only {
                let local = self.store.get_all().await?;
                let extra = local_only_pids(&local, &remote);

                if local.len() > remote.len() && !extra.is_empty() {
                    if push_rounds >= self.max_merge_rounds {
                        warn!(
                            round,
                            outstanding = extra.len(),
                            "Progress merge did not converge"
                        );
                        return Err(SyncError::MergeIncomplete {
                            rounds: round,
                            outstanding: extra.len(),
                        });
                    }

                    debug!(round, extra = extra.len(), "Pushing local-only progress");
                    self.push_and_record(&extra).await?;
                    push_rounds += 1;
                    pushed += extra.len();
                    continue;
                }
            }

            self.store.replace_all(&remote).await?;
            let records = self.store.count().await?;
            self.counter.set_current(records);

            let report = MergeReport {
                rounds: round,
                pushed,
                records: records as usize,
            };
            info!(
                rounds = report.rounds,
                pushed = report.pushed,
                records = report.records,
                "Progress merged"
            );
            self.ctx.emit(SyncEvent::ProgressMerged {
                rounds: report.rounds,
                pushed: report.pushed,
                records: report.records,
            });
            return Ok(report);
        }
    }

    /// Record progress on one item. Returns whether the remote was involved.
    pub async fn add(&self, pid: &str, course: i64, subject: i64, kind: i64) -> Result<bool> {
        let guard = self.counter.adjust(1);
        let record = ItemRecord::new(pid, course, subject, kind, self.now());

        let synced = self.ctx.is_logged_in().await;
        if synced {
            let pids = vec![pid.to_string()];
            self.push(&pids).await?;
        }

        if self.insert_missing(vec![record]).await? > 0 {
            guard.commit();
        }

        self.ctx.emit(SyncEvent::ProgressAdded {
            pid: pid.to_string(),
            synced,
        });
        Ok(synced)
    }

    /// Record progress on many items at once.
    ///
    /// Records created here carry no classification: only the identifiers
    /// are known at this point. Returns the number of records added locally.
    pub async fn add_batch(&self, pids: &[String]) -> Result<usize> {
        let guard = self.counter.adjust(pids.len() as i64);

        if self.ctx.is_logged_in().await {
            self.push(pids).await?;
        }

        let added = self.insert_missing(self.unclassified(pids)).await?;
        guard.settle(added as i64);
        Ok(added)
    }

    /// Remove progress on one item. Returns whether the remote was involved.
    pub async fn delete(&self, pid: &str) -> Result<bool> {
        let guard = self.counter.adjust(-1);

        let synced = self.ctx.is_logged_in().await;
        if synced {
            let pids = vec![pid.to_string()];
            self.ctx
                .call("delete_progress", |token| {
                    let client = self.ctx.remote.clone();
                    let pids = pids.clone();
                    async move { client.delete(RemoteResource::Progress, &token, &pids).await }
                })
                .await?;
        }

        let mut records = self.store.get_all().await?;
        let before = records.len();
        records.retain(|r| r.pid != pid);

        if records.len() < before {
            self.store.replace_all(&records).await?;
            guard.commit();
        }

        self.ctx.emit(SyncEvent::ProgressDeleted {
            pid: pid.to_string(),
            synced,
        });
        Ok(synced)
    }

    pub async fn has_progress(&self, pid: &str) -> Result<bool> {
        Ok(self.store.exists(pid).await?)
    }

    pub async fn get_all(&self) -> Result<Vec<ProgressRecord>> {
        Ok(self.store.get_all().await?)
    }

    pub async fn get_by_subject(&self, filter: SubjectFilter) -> Result<Vec<ProgressRecord>> {
        Ok(filter.apply(self.store.get_all().await?))
    }

    /// Recount `current` from the store and take `total` from the curriculum.
    pub async fn update_counter(&self, curriculum: Curriculum) -> Result<CounterSnapshot> {
        let snapshot = CounterSnapshot {
            current: self.store.count().await?,
            total: curriculum.total(),
        };
        self.counter.set(snapshot);

        self.ctx.emit(SyncEvent::CounterUpdated {
            current: snapshot.current,
            total: snapshot.total,
        });
        Ok(snapshot)
    }

    async fn push(&self, pids: &[String]) -> Result<()> {
        let owned: Vec<String> = pids.to_vec();
        self.ctx
            .call("add_progress", |token| {
                let client = self.ctx.remote.clone();
                let pids = owned.clone();
                async move { client.push(RemoteResource::Progress, &token, &pids).await }
            })
            .await
    }

    /// Push pids that are already local and record any that went missing
    /// meanwhile. The counter is left alone; the merge recounts it.
    async fn push_and_record(&self, pids: &[String]) -> Result<()> {
        self.push(pids).await?;
        self.insert_missing(self.unclassified(pids)).await?;
        Ok(())
    }

    /// Append the records whose pid is not stored yet. Returns how many were
    /// appended.
    async fn insert_missing(&self, candidates: Vec<ProgressRecord>) -> Result<usize> {
        let mut records = self.store.get_all().await?;
        let mut known: HashSet<String> = records.iter().map(|r| r.pid.clone()).collect();

        let before = records.len();
        for candidate in candidates {
            if known.insert(candidate.pid.clone()) {
                records.push(candidate);
            }
        }

        let added = records.len() - before;
        if added > 0 {
            self.store.replace_all(&records).await?;
        }
        Ok(added)
    }

    fn unclassified(&self, pids: &[String]) -> Vec<ProgressRecord> {
        let time = self.now();
        pids.iter()
            .map(|pid| ItemRecord::unclassified(pid.clone(), time.clone()))
            .collect()
    }

    /// Progress records are stamped with epoch milliseconds.
    fn now(&self) -> String {
        self.ctx.clock.unix_timestamp_millis().to_string()
    }
}

/// Pids held locally but absent from `remote`, in local order.
fn local_only_pids(local: &[ProgressRecord], remote: &[ProgressRecord]) -> Vec<String> {
    let remote_pids: HashSet<&str> = remote.iter().map(|r| r.pid.as_str()).collect();
    local
        .iter()
        .filter(|r| !remote_pids.contains(r.pid.as_str()))
        .map(|r| r.pid.clone())
        .collect()
}
