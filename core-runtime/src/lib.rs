//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the progress sync core:
//! - Logging and tracing bootstrap
//! - Configuration management (`CoreConfig`, `UserSettings`, `RenewalPolicy`)
//! - Event bus system
//!
//! Every other core crate depends on this one for its configuration types and
//! event vocabulary.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, RenewalPolicy, UserSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
