//! # Offline Error Types
//!
//! Errors surfaced by the download orchestrator and the offline façade.
//! Store operations never fail; only explicit persistence (`flush`) does.

use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while downloading or managing offline tracks.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// `initialize()` has not completed, so the download directory is unknown.
    #[error("Offline downloads not initialized")]
    NotInitialized,

    /// Track record is unusable (empty id).
    #[error("Invalid track: {0}")]
    InvalidTrack(String),

    /// Transfer failed on the network side.
    #[error("Network error: {0}")]
    Network(String),

    /// Local disk write, rename or stat failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transfer exceeded the configured per-download timeout.
    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    /// Transfer stopped by pause or clear.
    #[error("Download cancelled")]
    Cancelled,

    /// Offline state could not be written to or read from the settings store.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl OfflineError {
    /// Returns `true` for failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, OfflineError::Network(_) | OfflineError::Timeout(_))
    }

    /// Classify a failure to open or read a remote stream.
    ///
    /// Server errors, throttling and transport failures are transient; other
    /// HTTP statuses (missing track, auth) are passed through unchanged.
    pub(crate) fn from_transfer(error: BridgeError) -> Self {
        match error {
            BridgeError::Http { status, .. }
                if status >= 500 || status == 408 || status == 429 =>
            {
                OfflineError::Network(error.to_string())
            }
            BridgeError::Http { .. } | BridgeError::NotFound(_) => OfflineError::Bridge(error),
            other => OfflineError::Network(other.to_string()),
        }
    }

    pub(crate) fn storage(error: impl std::fmt::Display) -> Self {
        OfflineError::Storage(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
