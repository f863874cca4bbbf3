//! # Star Reconciliation
//!
//! Starred items live in folders. The remote knows a single list, which maps
//! to the default folder; a fetch replaces that folder with it. There is no
//! size comparison on fetch, unlike progress.

use crate::context::SyncContext;
use crate::error::Result;
use crate::remote::{discard_invalid, RemoteResource};
use core_library::{ItemRecord, StarRecord, StarRepository, SubjectFilter};
use core_runtime::events::SyncEvent;
use std::sync::Arc;
use tracing::info;

pub struct StarSync {
    ctx: Arc<SyncContext>,
    store: Arc<dyn StarRepository>,
    default_folder: String,
}

impl StarSync {
    pub fn new(
        ctx: Arc<SyncContext>,
        store: Arc<dyn StarRepository>,
        default_folder: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            store,
            default_folder: default_folder.into(),
        }
    }

    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    /// Replace the default folder with the remote list. Returns its size.
    pub async fn fetch_stars(&self) -> Result<usize> {
        let remote = self
            .ctx
            .call("fetch_stars", |token| {
                let client = self.ctx.remote.clone();
                async move { client.fetch(RemoteResource::Star, &token).await }
            })
            .await?;
        let remote = discard_invalid(RemoteResource::Star, remote);

        self.store
            .replace_folder(&self.default_folder, &remote)
            .await?;

        info!(folder = %self.default_folder, count = remote.len(), "Stars fetched");
        self.ctx.emit(SyncEvent::StarsFetched {
            folder: self.default_folder.clone(),
            count: remote.len(),
        });
        Ok(remote.len())
    }

    /// Whether `pid` is starred in any folder.
    pub async fn is_starred(&self, pid: &str) -> Result<bool> {
        Ok(self.store.exists(pid).await?)
    }

    pub async fn is_starred_in(&self, pid: &str, folder: &str) -> Result<bool> {
        Ok(self.store.exists_in_folder(pid, folder).await?)
    }

    /// Star an item in the default folder. Returns whether the remote was
    /// involved.
    pub async fn add_star(&self, pid: &str, course: i64, subject: i64, kind: i64) -> Result<bool> {
        let record = ItemRecord::new(pid, course, subject, kind, self.ctx.clock.rfc3339());

        let synced = self.ctx.is_logged_in().await;
        if synced {
            let pids = vec![pid.to_string()];
            self.ctx
                .call("add_star", |token| {
                    let client = self.ctx.remote.clone();
                    let pids = pids.clone();
                    async move { client.push(RemoteResource::Star, &token, &pids).await }
                })
                .await?;
        }

        // A previous attempt may already have stored it.
        if !self
            .store
            .exists_in_folder(pid, &self.default_folder)
            .await?
        {
            self.store
                .add_to_folder(&record, &self.default_folder)
                .await?;
        }

        self.ctx.emit(SyncEvent::StarAdded {
            pid: pid.to_string(),
            folder: self.default_folder.clone(),
            synced,
        });
        Ok(synced)
    }

    /// Unstar an item from the default folder. Returns whether the remote was
    /// involved.
    pub async fn remove_star(&self, pid: &str) -> Result<bool> {
        let synced = self.ctx.is_logged_in().await;
        if synced {
            let pids = vec![pid.to_string()];
            self.ctx
                .call("remove_star", |token| {
                    let client = self.ctx.remote.clone();
                    let pids = pids.clone();
                    async move { client.delete(RemoteResource::Star, &token, &pids).await }
                })
                .await?;
        }

        self.store
            .remove_from_folder(pid, &self.default_folder)
            .await?;

        self.ctx.emit(SyncEvent::StarRemoved {
            pid: pid.to_string(),
            folder: self.default_folder.clone(),
            synced,
        });
        Ok(synced)
    }

    pub async fn get_folder(&self, folder: &str) -> Result<Vec<StarRecord>> {
        Ok(self.store.get_folder(folder).await?)
    }

    pub async fn get_folder_by_subject(
        &self,
        filter: SubjectFilter,
        folder: &str,
    ) -> Result<Vec<StarRecord>> {
        Ok(filter.apply(self.store.get_folder(folder).await?))
    }

    pub async fn list_folders(&self) -> Result<Vec<String>> {
        Ok(self.store.list_folders().await?)
    }
}
