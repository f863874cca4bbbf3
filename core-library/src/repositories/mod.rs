//! # Repository Pattern Implementation
//!
//! Repository traits for the local collections, with SQLite implementations
//! over a shared `sqlx` pool.
//!
//! - `ProgressRepository` - the progress set, keyed by `pid`
//! - `StarRepository` - starred items grouped by folder

pub mod progress;
pub mod star;

pub use progress::{ProgressRepository, SqliteProgressRepository};
pub use star::{SqliteStarRepository, StarRepository};
