//! # Local Store
//!
//! Owns the device-local copy of the user's progress and starred items.
//!
//! - SQLite schema and embedded migrations ([`db`])
//! - Record models and subject filtering ([`models`])
//! - Repository traits consumed by the sync core ([`repositories`])

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{ItemRecord, ProgressRecord, StarRecord, SubjectFilter, ANY};
pub use repositories::{
    ProgressRepository, SqliteProgressRepository, SqliteStarRepository, StarRepository,
};
