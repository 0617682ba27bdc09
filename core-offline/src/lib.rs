//! # Offline Downloads
//!
//! Offline download subsystem for the OpenSubsonic client core.
//!
//! ## Overview
//!
//! - [`OfflineStateStore`]: downloaded tracks, the download queue, ephemeral
//!   progress and the offline-mode flag, persisted through a
//!   [`SettingsStore`](bridge_traits::storage::SettingsStore)
//! - [`DownloadOrchestrator`]: bounded worker pool that streams tracks to disk
//!   and reconciles results into the store
//! - [`OfflineDownloads`]: façade for screens that also prefetches starred
//!   tracks while offline mode is on
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_offline::{DownloadBridges, DownloadConfig, DownloadOrchestrator, OfflineStateStore};
//!
//! let store = OfflineStateStore::load(settings, "offline-storage").await?;
//! let orchestrator = DownloadOrchestrator::new(DownloadConfig::default(), store, bridges, None)?;
//! orchestrator.initialize().await?;
//! orchestrator.download_track(track).await?;
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod models;
pub mod orchestrator;
pub mod stats;
pub mod store;

pub use config::{DownloadConfig, DEFAULT_PERSISTENCE_KEY};
pub use error::{OfflineError, Result};
pub use facade::{missing_starred_tracks, OfflineDownloads};
pub use models::{
    BatchSummary, DownloadAcceptance, DownloadOutcome, DownloadProgress, DownloadStatus,
    OfflineTrack, PlaybackSource,
};
pub use orchestrator::{DownloadBridges, DownloadOrchestrator};
pub use stats::{format_bytes, StorageStats};
pub use store::{OfflineStateStore, Snapshot, SNAPSHOT_VERSION};
