//! # Progress & Star Sync
//!
//! Reconciles the device-local progress and star collections with the
//! remote service.
//!
//! ## Overview
//!
//! - Works offline (local only), online (local mirrors remote) and across
//!   the transition (local-only records are pushed on the next fetch)
//! - Renews an expired credential and re-issues the call, a bounded number
//!   of times
//! - Reports failures through the host notification sink instead of
//!   propagating them from the guarded entry points
//!
//! ## Components
//!
//! - **Remote Client** (`remote`): HTTP access to `/user/progress` and
//!   `/user/star`, closed outcome type
//! - **Renew and Retry** (`retry`): Bounded credential renewal loop
//! - **Progress** (`progress`): Fetch-and-merge, add, batch add, delete, queries
//! - **Stars** (`star`): Folder-scoped star reconciliation
//! - **Counter** (`counter`): Optimistic progress counter with rollback
//! - **Sync Coordinator** (`coordinator`): Entry points and failure boundary

mod context;
pub mod coordinator;
pub mod counter;
pub mod error;
pub mod progress;
pub mod remote;
pub mod retry;
pub mod star;

pub use context::SyncContext;
pub use coordinator::{SyncCoordinator, SyncDependencies, SyncOptions};
pub use counter::{CounterGuard, CounterSnapshot, Curriculum, ProgressCounter};
pub use error::{Result, SyncError};
pub use progress::{MergeReport, ProgressSync};
pub use remote::{HttpRemoteClient, RemoteClient, RemoteOutcome, RemoteResource};
pub use retry::{with_renewal, RetryState};
pub use star::StarSync;
