//! Workspace umbrella crate.
//!
//! Exposes the feature flags that map to the individual workspace crates
//! (`desktop-shims` enables the reqwest/tokio/SQLite bridges). Host
//! applications can depend on `offline-core-workspace` and reach the service
//! without wiring each crate individually.

pub use core_service::*;
