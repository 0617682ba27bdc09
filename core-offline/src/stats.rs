//! Storage statistics

use serde::{Deserialize, Serialize};

/// Point-in-time summary of the offline store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of downloaded tracks
    pub downloaded_tracks: usize,

    /// Sum of downloaded file sizes
    pub total_bytes: u64,

    /// Ids waiting in the download queue
    pub queued: usize,

    pub pending: usize,
    pub downloading: usize,
    pub failed: usize,
    pub paused: usize,

    pub offline_mode_enabled: bool,
}

impl StorageStats {
    /// Returns average bytes per downloaded track.
    pub fn average_track_size(&self) -> u64 {
        if self.downloaded_tracks == 0 {
            0
        } else {
            self.total_bytes / self.downloaded_tracks as u64
        }
    }

    /// Tracks that still need a worker slot or are holding one.
    pub fn in_flight(&self) -> usize {
        self.pending + self.downloading
    }

    /// Format total size as human-readable string.
    pub fn total_size_string(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

/// Format a byte count as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
