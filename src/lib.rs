//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `progress-sync-workspace`
//! and enable `desktop-shims` instead of wiring `core-service` and its bridges
//! by hand.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
