//! # Offline Domain Models
//!
//! Records kept by the offline state store and values returned by the
//! orchestrator. Identifiers are the remote server's track ids.

use bridge_traits::media::RemoteTrack;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Keys `OfflineTrack` serializes itself. Remote fields with these names are
/// stored under a `server` prefix so the record never repeats a key.
const RECORD_KEYS: &[&str] = &[
    "id",
    "title",
    "artist",
    "album",
    "coverArt",
    "duration",
    "path",
    "size",
    "downloadedAt",
];

/// A downloaded track.
///
/// Present in the store only while its audio file exists at `path` with
/// `size` bytes. Metadata is copied at download time and never re-fetched.
/// Fields the core does not interpret travel in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineTrack {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
    /// Playback length in seconds
    #[serde(default)]
    pub duration: u32,
    /// Local audio file
    pub path: PathBuf,
    /// Bytes on disk
    pub size: u64,
    /// ISO-8601 completion timestamp
    pub downloaded_at: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl OfflineTrack {
    /// Build the durable record for a finished transfer of `track`.
    ///
    /// Remote fields without a dedicated slot (`contentType`, `suffix`, and
    /// anything unknown) are kept in `extra`. An unknown field that shares a
    /// record key, such as the server-side `path`, becomes `serverPath`.
    pub fn from_remote(
        track: &RemoteTrack,
        path: PathBuf,
        size: u64,
        downloaded_at: impl Into<String>,
    ) -> Self {
        let mut extra = BTreeMap::new();
        for (key, value) in &track.extra {
            if RECORD_KEYS.contains(&key.as_str()) {
                extra.insert(server_key(key), value.clone());
            } else {
                extra.insert(key.clone(), value.clone());
            }
        }
        if let Some(content_type) = &track.content_type {
            extra.insert(
                "contentType".to_string(),
                serde_json::Value::String(content_type.clone()),
            );
        }
        if let Some(suffix) = &track.suffix {
            extra.insert(
                "suffix".to_string(),
                serde_json::Value::String(suffix.clone()),
            );
        }

        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            cover_art: track.cover_art.clone(),
            duration: track.duration,
            path,
            size,
            downloaded_at: downloaded_at.into(),
            extra,
        }
    }
}

fn server_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => format!("server{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => "server".to_string(),
    }
}

/// Transfer state of a single track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
    Paused,
}

impl DownloadStatus {
    /// Waiting for or holding a worker slot.
    pub fn is_active(&self) -> bool {
        matches!(self, DownloadStatus::Pending | DownloadStatus::Downloading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral progress record. Never persisted.
///
/// `error` is set only when `status` is [`DownloadStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub track_id: String,
    pub status: DownloadStatus,
    /// Whole percent, 0-100
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn pending(track_id: impl Into<String>) -> Self {
        Self::with_status(track_id, DownloadStatus::Pending, 0)
    }

    pub fn downloading(track_id: impl Into<String>, progress: u8) -> Self {
        Self::with_status(track_id, DownloadStatus::Downloading, progress.min(100))
    }

    pub fn paused(track_id: impl Into<String>) -> Self {
        Self::with_status(track_id, DownloadStatus::Paused, 0)
    }

    pub fn failed(track_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            status: DownloadStatus::Failed,
            progress: 0,
            error: Some(error.into()),
        }
    }

    fn with_status(track_id: impl Into<String>, status: DownloadStatus, progress: u8) -> Self {
        Self {
            track_id: track_id.into(),
            status,
            progress,
            error: None,
        }
    }
}

/// What `download_track` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadAcceptance {
    /// Added to the queue.
    Queued,
    /// Already on disk; nothing to do.
    AlreadyDownloaded,
    /// Already queued or transferring.
    AlreadyPending,
}

/// Per-batch tally of [`DownloadAcceptance`] results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub queued: usize,
    pub already_downloaded: usize,
    pub already_pending: usize,
}

impl BatchSummary {
    pub fn record(&mut self, acceptance: DownloadAcceptance) {
        match acceptance {
            DownloadAcceptance::Queued => self.queued += 1,
            DownloadAcceptance::AlreadyDownloaded => self.already_downloaded += 1,
            DownloadAcceptance::AlreadyPending => self.already_pending += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.already_downloaded + self.already_pending
    }
}

/// Terminal state observed by `wait_for_download`.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed(OfflineTrack),
    Failed(String),
    Paused,
    /// Neither downloaded nor tracked by the orchestrator.
    NotTracked,
}

/// Where the playback engine should read a track from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSource {
    Local(PathBuf),
    Remote(String),
}

impl PlaybackSource {
    pub fn is_local(&self) -> bool {
        matches!(self, PlaybackSource::Local(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_track_keeps_unknown_fields() {
        let mut remote = RemoteTrack::new("tr-1", "Intro")
            .with_artist("Band")
            .with_duration(215)
            .with_suffix("flac");
        remote
            .extra
            .insert("bitRate".to_string(), serde_json::json!(1411));

        let track = OfflineTrack::from_remote(
            &remote,
            PathBuf::from("/data/offline_tracks/tr-1.flac"),
            4096,
            "2024-05-01T10:00:00.000Z",
        );

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["id"], "tr-1");
        assert_eq!(json["downloadedAt"], "2024-05-01T10:00:00.000Z");
        assert_eq!(json["bitRate"], 1411);
        assert_eq!(json["suffix"], "flac");
        assert!(json.get("album").is_none());

        let back: OfflineTrack = serde_json::from_value(json).unwrap();
        assert_eq!(back, track);
    }

    #[test]
    fn test_remote_fields_named_like_record_keys_are_prefixed() {
        let remote: RemoteTrack = serde_json::from_value(serde_json::json!({
            "id": "tr-2",
            "title": "Intro",
            "path": "Band/A/01 - Intro.flac",
            "downloadedAt": "yesterday",
            "size": 3_000_000,
            "suffix": "flac"
        }))
        .unwrap();

        let track = OfflineTrack::from_remote(
            &remote,
            PathBuf::from("/data/offline_tracks/tr-2.flac"),
            2048,
            "2024-05-01T10:00:00.000Z",
        );
        assert_eq!(
            track.extra.get("serverPath"),
            Some(&serde_json::json!("Band/A/01 - Intro.flac"))
        );
        assert_eq!(
            track.extra.get("serverDownloadedAt"),
            Some(&serde_json::json!("yesterday"))
        );
        assert!(!track.extra.contains_key("path"));

        let encoded = serde_json::to_string(&track).unwrap();
        let back: OfflineTrack = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back, track);
        assert_eq!(back.path, PathBuf::from("/data/offline_tracks/tr-2.flac"));
        assert_eq!(back.size, 2048);
    }

    #[test]
    fn test_progress_serialization() {
        let failed = DownloadProgress::failed("a", "HTTP 500");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["trackId"], "a");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "HTTP 500");

        let pending = serde_json::to_value(DownloadProgress::pending("a")).unwrap();
        assert!(pending.get("error").is_none());
    }

    #[test]
    fn test_status_helpers() {
        assert!(DownloadStatus::Pending.is_active());
        assert!(DownloadStatus::Downloading.is_active());
        assert!(!DownloadStatus::Paused.is_active());
        assert!(!DownloadStatus::Failed.is_active());
        assert_eq!(DownloadStatus::Downloading.to_string(), "downloading");
        assert_eq!(DownloadProgress::downloading("a", 250).progress, 100);
    }

    #[test]
    fn test_batch_summary() {
        let mut summary = BatchSummary::default();
        summary.record(DownloadAcceptance::Queued);
        summary.record(DownloadAcceptance::Queued);
        summary.record(DownloadAcceptance::AlreadyDownloaded);
        summary.record(DownloadAcceptance::AlreadyPending);

        assert_eq!(summary.queued, 2);
        assert_eq!(summary.total(), 4);
    }
}
