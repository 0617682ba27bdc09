//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the offline core crates:
//! - Logging and tracing setup, including credential redaction helpers
//! - Configuration (`CoreConfig`) with fail-fast capability checks
//! - Event bus for download and offline-mode notifications

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
