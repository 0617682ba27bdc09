//! # Offline State Store
//!
//! Single source of truth for what is downloaded, queued and in flight, plus
//! the offline-mode flag.
//!
//! State is split in two halves:
//! - [`Snapshot`]: offline-mode flag, downloaded tracks and the download queue.
//!   Serialized as one JSON blob under a well-known settings key.
//! - Transient progress records, which are never persisted. A restart finds no
//!   progress, whatever was in flight.
//!
//! Every operation is synchronous and infallible. Mutations apply to the
//! in-memory state under a single write lock and are then written through to
//! the [`SettingsStore`] by a background task. Writes are ordered by a snapshot
//! revision so an older snapshot never overwrites a newer one; [`flush`]
//! awaits the write and reports failures.
//!
//! [`flush`]: OfflineStateStore::flush

use crate::error::{OfflineError, Result};
use crate::models::{DownloadProgress, DownloadStatus, OfflineTrack};
use crate::stats::StorageStats;
use bridge_traits::storage::SettingsStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

/// Version written into every persisted snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted half of the offline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default = "current_snapshot_version")]
    pub version: u32,
    #[serde(default)]
    pub offline_mode_enabled: bool,
    #[serde(default)]
    pub downloaded_tracks: HashMap<String, OfflineTrack>,
    #[serde(default)]
    pub download_queue: Vec<String>,
}

fn current_snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            offline_mode_enabled: false,
            downloaded_tracks: HashMap::new(),
            download_queue: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    snapshot: Snapshot,
    progress: HashMap<String, DownloadProgress>,
    /// Bumped on every snapshot change; compared against the last written one.
    snapshot_revision: u64,
}

struct Persistence {
    settings: Arc<dyn SettingsStore>,
    key: String,
    /// Revision of the last snapshot written; held for the duration of a write.
    written_revision: AsyncMutex<u64>,
}

struct StoreInner {
    state: RwLock<StoreState>,
    persistence: Option<Persistence>,
    revision: watch::Sender<u64>,
    offline_mode: watch::Sender<bool>,
}

/// Shared handle to the offline state. Cloning is cheap.
#[derive(Clone)]
pub struct OfflineStateStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for OfflineStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("OfflineStateStore")
            .field("offline_mode_enabled", &state.snapshot.offline_mode_enabled)
            .field("downloaded_tracks", &state.snapshot.downloaded_tracks.len())
            .field("download_queue", &state.snapshot.download_queue.len())
            .field("progress", &state.progress.len())
            .field("persistent", &self.inner.persistence.is_some())
            .finish()
    }
}

impl OfflineStateStore {
    /// Store without durable backing. State is lost on drop.
    pub fn in_memory() -> Self {
        Self::from_parts(Snapshot::default(), None)
    }

    /// Load the snapshot stored under `key`, falling back to an empty state
    /// when the blob is missing, unreadable, or from a newer version.
    ///
    /// # Errors
    ///
    /// Fails only when the settings store itself cannot be read.
    pub async fn load(settings: Arc<dyn SettingsStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let raw = settings.get_string(&key).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to read offline state");
            OfflineError::Persistence(format!("Failed to read '{}': {}", key, e))
        })?;

        let snapshot = match raw {
            None => {
                info!(key = %key, "No persisted offline state, starting empty");
                Snapshot::default()
            }
            Some(json) => match serde_json::from_str::<Snapshot>(&json) {
                Ok(snapshot) if snapshot.version <= SNAPSHOT_VERSION => {
                    info!(
                        downloaded = snapshot.downloaded_tracks.len(),
                        queued = snapshot.download_queue.len(),
                        offline_mode = snapshot.offline_mode_enabled,
                        "Loaded offline state"
                    );
                    snapshot
                }
                Ok(snapshot) => {
                    warn!(
                        version = snapshot.version,
                        supported = SNAPSHOT_VERSION,
                        "Offline state written by a newer version, starting empty"
                    );
                    Snapshot::default()
                }
                Err(e) => {
                    warn!(error = %e, "Discarding corrupt offline state");
                    Snapshot::default()
                }
            },
        };

        let persistence = Persistence {
            settings,
            key,
            written_revision: AsyncMutex::new(0),
        };

        Ok(Self::from_parts(snapshot, Some(persistence)))
    }

    fn from_parts(snapshot: Snapshot, persistence: Option<Persistence>) -> Self {
        let (revision, _) = watch::channel(0);
        let (offline_mode, _) = watch::channel(snapshot.offline_mode_enabled);

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    snapshot,
                    ..StoreState::default()
                }),
                persistence,
                revision,
                offline_mode,
            }),
        }
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    /// Receiver whose value changes after every effective mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Receiver for the offline-mode flag only.
    pub fn subscribe_offline_mode(&self) -> watch::Receiver<bool> {
        self.inner.offline_mode.subscribe()
    }

    /// Apply `f` under the write lock. `f` reports whether anything changed;
    /// unchanged state neither notifies nor persists.
    fn mutate<R>(&self, persist: bool, f: impl FnOnce(&mut StoreState) -> (R, bool)) -> R {
        let (result, changed) = {
            let mut state = self.inner.state.write();
            let (result, changed) = f(&mut state);
            if changed {
                if persist {
                    state.snapshot_revision += 1;
                }
                let enabled = state.snapshot.offline_mode_enabled;
                self.inner.offline_mode.send_if_modified(|current| {
                    let modified = *current != enabled;
                    *current = enabled;
                    modified
                });
                self.inner.revision.send_modify(|revision| *revision += 1);
            }
            (result, changed)
        };

        if changed && persist {
            self.schedule_persist();
        }
        result
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn schedule_persist(&self) {
        if self.inner.persistence.is_none() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                handle.spawn(async move {
                    if let Err(e) = store.write_latest().await {
                        error!(error = %e, "Failed to persist offline state");
                    }
                });
            }
            Err(_) => debug!("No async runtime, offline state will be written on next flush"),
        }
    }

    async fn write_latest(&self) -> Result<()> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };

        let mut written = persistence.written_revision.lock().await;
        let (revision, json) = {
            let state = self.inner.state.read();
            if state.snapshot_revision <= *written {
                return Ok(());
            }
            let json = serde_json::to_string(&state.snapshot).map_err(|e| {
                OfflineError::Persistence(format!("Failed to serialize offline state: {}", e))
            })?;
            (state.snapshot_revision, json)
        };

        persistence
            .settings
            .set_string(&persistence.key, &json)
            .await
            .map_err(|e| {
                OfflineError::Persistence(format!("Failed to write '{}': {}", persistence.key, e))
            })?;

        *written = revision;
        debug!(revision, bytes = json.len(), "Persisted offline state");
        Ok(())
    }

    /// Write the current snapshot if it has not been written yet.
    ///
    /// Returns once the settings store has accepted the latest snapshot.
    pub async fn flush(&self) -> Result<()> {
        self.write_latest().await
    }

    /// Copy of the persisted half of the state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.read().snapshot.clone()
    }

    // ========================================================================
    // Offline mode
    // ========================================================================

    pub fn set_offline_mode_enabled(&self, enabled: bool) {
        self.mutate(true, |state| {
            let changed = state.snapshot.offline_mode_enabled != enabled;
            state.snapshot.offline_mode_enabled = enabled;
            ((), changed)
        });
    }

    pub fn is_offline_mode_enabled(&self) -> bool {
        self.inner.state.read().snapshot.offline_mode_enabled
    }

    // ========================================================================
    // Downloaded tracks
    // ========================================================================

    /// Insert or replace the record for `track.id`.
    pub fn add_downloaded_track(&self, track: OfflineTrack) {
        self.mutate(true, |state| {
            let previous = state
                .snapshot
                .downloaded_tracks
                .insert(track.id.clone(), track.clone());
            ((), previous.as_ref() != Some(&track))
        });
    }

    /// Remove the record for `track_id`. The file on disk is left alone.
    pub fn remove_downloaded_track(&self, track_id: &str) -> Option<OfflineTrack> {
        self.mutate(true, |state| {
            let removed = state.snapshot.downloaded_tracks.remove(track_id);
            let changed = removed.is_some();
            (removed, changed)
        })
    }

    /// Reset downloaded tracks, progress and queue in one step.
    ///
    /// Returns the records that were removed.
    pub fn clear_all_downloads(&self) -> Vec<OfflineTrack> {
        self.mutate(true, |state| {
            let changed = !state.snapshot.downloaded_tracks.is_empty()
                || !state.snapshot.download_queue.is_empty()
                || !state.progress.is_empty();
            let removed = state
                .snapshot
                .downloaded_tracks
                .drain()
                .map(|(_, track)| track)
                .collect();
            state.snapshot.download_queue.clear();
            state.progress.clear();
            (removed, changed)
        })
    }

    pub fn is_track_downloaded(&self, track_id: &str) -> bool {
        self.inner
            .state
            .read()
            .snapshot
            .downloaded_tracks
            .contains_key(track_id)
    }

    pub fn get_downloaded_track(&self, track_id: &str) -> Option<OfflineTrack> {
        self.inner
            .state
            .read()
            .snapshot
            .downloaded_tracks
            .get(track_id)
            .cloned()
    }

    /// All downloaded tracks, in no particular order.
    pub fn get_downloaded_tracks_list(&self) -> Vec<OfflineTrack> {
        self.inner
            .state
            .read()
            .snapshot
            .downloaded_tracks
            .values()
            .cloned()
            .collect()
    }

    pub fn get_total_download_size(&self) -> u64 {
        self.inner
            .state
            .read()
            .snapshot
            .downloaded_tracks
            .values()
            .map(|track| track.size)
            .sum()
    }

    pub fn get_downloaded_tracks_count(&self) -> usize {
        self.inner.state.read().snapshot.downloaded_tracks.len()
    }

    // ========================================================================
    // Progress
    // ========================================================================

    /// Insert or replace the progress record for `progress.track_id`.
    pub fn set_download_progress(&self, progress: DownloadProgress) {
        self.mutate(false, |state| {
            let previous = state
                .progress
                .insert(progress.track_id.clone(), progress.clone());
            ((), previous.as_ref() != Some(&progress))
        });
    }

    pub fn remove_download_progress(&self, track_id: &str) {
        self.mutate(false, |state| {
            let changed = state.progress.remove(track_id).is_some();
            ((), changed)
        });
    }

    pub fn get_download_progress(&self, track_id: &str) -> Option<DownloadProgress> {
        self.inner.state.read().progress.get(track_id).cloned()
    }

    /// All progress records, in no particular order.
    pub fn all_download_progress(&self) -> Vec<DownloadProgress> {
        self.inner.state.read().progress.values().cloned().collect()
    }

    /// Drop every `failed` progress record. Returns how many were dropped.
    pub fn clear_failed_progress(&self) -> usize {
        self.mutate(false, |state| {
            let before = state.progress.len();
            state
                .progress
                .retain(|_, progress| progress.status != DownloadStatus::Failed);
            let removed = before - state.progress.len();
            (removed, removed > 0)
        })
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// Append `track_id` unless it is already queued. Returns `true` if added.
    pub fn add_to_download_queue(&self, track_id: &str) -> bool {
        self.mutate(true, |state| {
            let queue = &mut state.snapshot.download_queue;
            if queue.iter().any(|id| id == track_id) {
                (false, false)
            } else {
                queue.push(track_id.to_string());
                (true, true)
            }
        })
    }

    /// Returns `true` if `track_id` was queued.
    pub fn remove_from_download_queue(&self, track_id: &str) -> bool {
        self.mutate(true, |state| {
            let queue = &mut state.snapshot.download_queue;
            let before = queue.len();
            queue.retain(|id| id != track_id);
            let removed = queue.len() != before;
            (removed, removed)
        })
    }

    pub fn clear_download_queue(&self) {
        self.mutate(true, |state| {
            let changed = !state.snapshot.download_queue.is_empty();
            state.snapshot.download_queue.clear();
            ((), changed)
        });
    }

    /// Move `track_ids` to the head of the queue, keeping their given order.
    /// Ids not yet queued are inserted.
    pub fn requeue_front(&self, track_ids: &[String]) {
        if track_ids.is_empty() {
            return;
        }
        self.mutate(true, |state| {
            let queue = &mut state.snapshot.download_queue;
            queue.retain(|id| !track_ids.contains(id));
            let mut reordered = track_ids.to_vec();
            reordered.dedup();
            reordered.append(queue);
            *queue = reordered;
            ((), true)
        });
    }

    /// Queued ids in dispatch order.
    pub fn download_queue(&self) -> Vec<String> {
        self.inner.state.read().snapshot.download_queue.clone()
    }

    pub fn is_queued(&self, track_id: &str) -> bool {
        self.inner
            .state
            .read()
            .snapshot
            .download_queue
            .iter()
            .any(|id| id == track_id)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> StorageStats {
        let state = self.inner.state.read();
        let mut stats = StorageStats {
            downloaded_tracks: state.snapshot.downloaded_tracks.len(),
            total_bytes: state
                .snapshot
                .downloaded_tracks
                .values()
                .map(|track| track.size)
                .sum(),
            queued: state.snapshot.download_queue.len(),
            offline_mode_enabled: state.snapshot.offline_mode_enabled,
            ..StorageStats::default()
        };

        for progress in state.progress.values() {
            match progress.status {
                DownloadStatus::Pending => stats.pending += 1,
                DownloadStatus::Downloading => stats.downloading += 1,
                DownloadStatus::Failed => stats.failed += 1,
                DownloadStatus::Paused => stats.paused += 1,
                DownloadStatus::Completed => {}
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MapSettings {
        values: Mutex<HashMap<String, String>>,
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl SettingsStore for MapSettings {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(BridgeError::OperationFailed("disk full".to_string()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.values
                .lock()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.values.lock().get(key).cloned())
        }

        async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
            self.set_string(key, &value.to_string()).await
        }

        async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
            Ok(self
                .values
                .lock()
                .get(key)
                .and_then(|value| value.parse().ok()))
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.values.lock().remove(key);
            Ok(())
        }

        async fn has_key(&self, key: &str) -> BridgeResult<bool> {
            Ok(self.values.lock().contains_key(key))
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.values.lock().keys().cloned().collect())
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            self.values.lock().clear();
            Ok(())
        }
    }

    fn track(id: &str, size: u64) -> OfflineTrack {
        OfflineTrack {
            id: id.to_string(),
            title: format!("Track {}", id),
            artist: None,
            album: None,
            cover_art: None,
            duration: 180,
            path: PathBuf::from(format!("/data/offline_tracks/{}.mp3", id)),
            size,
            downloaded_at: "2024-05-01T10:00:00.000Z".to_string(),
            extra: Default::default(),
        }
    }

    #[test]
    fn test_downloaded_tracks() {
        let store = OfflineStateStore::in_memory();
        assert!(!store.is_track_downloaded("a"));
        assert_eq!(store.get_downloaded_track("a"), None);

        store.add_downloaded_track(track("a", 100));
        store.add_downloaded_track(track("b", 250));
        assert!(store.is_track_downloaded("a"));
        assert_eq!(store.get_downloaded_tracks_count(), 2);
        assert_eq!(store.get_total_download_size(), 350);

        // Re-adding replaces the record.
        store.add_downloaded_track(track("a", 120));
        assert_eq!(store.get_downloaded_tracks_count(), 2);
        assert_eq!(store.get_total_download_size(), 370);

        assert!(store.remove_downloaded_track("a").is_some());
        assert!(store.remove_downloaded_track("a").is_none());
        assert!(!store.is_track_downloaded("a"));
        assert_eq!(store.get_total_download_size(), 250);
    }

    #[test]
    fn test_total_size_matches_list() {
        let store = OfflineStateStore::in_memory();
        for (i, size) in [10u64, 0, 4096, 7].iter().enumerate() {
            store.add_downloaded_track(track(&i.to_string(), *size));
            let sum: u64 = store
                .get_downloaded_tracks_list()
                .iter()
                .map(|t| t.size)
                .sum();
            assert_eq!(store.get_total_download_size(), sum);
        }
        store.remove_downloaded_track("2");
        let sum: u64 = store
            .get_downloaded_tracks_list()
            .iter()
            .map(|t| t.size)
            .sum();
        assert_eq!(store.get_total_download_size(), sum);
    }

    #[test]
    fn test_queue_is_set_like() {
        let store = OfflineStateStore::in_memory();
        assert!(store.add_to_download_queue("a"));
        assert!(store.add_to_download_queue("b"));
        assert!(!store.add_to_download_queue("a"));
        assert_eq!(store.download_queue(), vec!["a", "b"]);

        assert!(store.remove_from_download_queue("a"));
        assert!(!store.remove_from_download_queue("a"));
        assert!(store.is_queued("b"));

        store.add_to_download_queue("c");
        store.requeue_front(&["c".to_string(), "x".to_string()]);
        assert_eq!(store.download_queue(), vec!["c", "x", "b"]);

        store.clear_download_queue();
        assert!(store.download_queue().is_empty());
    }

    #[test]
    fn test_progress_and_failed_cleanup() {
        let store = OfflineStateStore::in_memory();
        store.set_download_progress(DownloadProgress::pending("a"));
        store.set_download_progress(DownloadProgress::failed("b", "HTTP 500"));
        store.set_download_progress(DownloadProgress::failed("c", "timeout"));

        assert_eq!(
            store.get_download_progress("a").map(|p| p.status),
            Some(DownloadStatus::Pending)
        );
        assert_eq!(store.clear_failed_progress(), 2);
        assert_eq!(store.all_download_progress().len(), 1);

        store.remove_download_progress("a");
        store.remove_download_progress("a");
        assert!(store.get_download_progress("a").is_none());
    }

    #[test]
    fn test_clear_all_downloads() {
        let store = OfflineStateStore::in_memory();
        store.add_downloaded_track(track("a", 1));
        store.add_to_download_queue("b");
        store.set_download_progress(DownloadProgress::pending("b"));

        let removed = store.clear_all_downloads();
        assert_eq!(removed.len(), 1);
        assert!(store.get_downloaded_tracks_list().is_empty());
        assert_eq!(store.get_total_download_size(), 0);
        assert!(store.download_queue().is_empty());
        assert!(store.all_download_progress().is_empty());
    }

    #[test]
    fn test_noop_mutations_do_not_notify() {
        let store = OfflineStateStore::in_memory();
        let revisions = store.subscribe();

        store.remove_downloaded_track("missing");
        store.remove_from_download_queue("missing");
        store.set_offline_mode_enabled(false);
        assert_eq!(*revisions.borrow(), 0);

        store.set_offline_mode_enabled(true);
        assert_eq!(*revisions.borrow(), 1);
    }

    #[tokio::test]
    async fn test_offline_mode_watch() {
        let store = OfflineStateStore::in_memory();
        let mut mode = store.subscribe_offline_mode();
        assert!(!*mode.borrow());

        store.set_offline_mode_enabled(true);
        mode.changed().await.unwrap();
        assert!(*mode.borrow_and_update());
        assert!(store.is_offline_mode_enabled());

        // Unrelated mutations leave the flag receiver untouched.
        store.add_to_download_queue("a");
        assert!(!mode.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let settings = Arc::new(MapSettings::default());
        let store = OfflineStateStore::load(settings.clone(), "offline-storage")
            .await
            .unwrap();

        store.set_offline_mode_enabled(true);
        store.add_downloaded_track(track("a", 42));
        store.add_to_download_queue("b");
        store.set_download_progress(DownloadProgress::downloading("b", 40));
        store.flush().await.unwrap();

        let reloaded = OfflineStateStore::load(settings.clone(), "offline-storage")
            .await
            .unwrap();
        assert!(reloaded.is_offline_mode_enabled());
        assert_eq!(reloaded.get_downloaded_track("a"), Some(track("a", 42)));
        assert_eq!(reloaded.download_queue(), vec!["b"]);
        assert!(reloaded.get_download_progress("b").is_none());

        let raw = settings.get_string("offline-storage").await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], SNAPSHOT_VERSION);
        assert_eq!(json["offlineModeEnabled"], true);
        assert!(json.get("progress").is_none());
    }

    #[tokio::test]
    async fn test_flush_is_idempotent() {
        let settings = Arc::new(MapSettings::default());
        let store = OfflineStateStore::load(settings.clone(), "k").await.unwrap();

        store.flush().await.unwrap();
        assert_eq!(settings.writes.load(Ordering::SeqCst), 0);

        store.add_to_download_queue("a");
        store.flush().await.unwrap();
        store.flush().await.unwrap();
        assert!(settings.writes.load(Ordering::SeqCst) >= 1);

        let writes = settings.writes.load(Ordering::SeqCst);
        store.set_download_progress(DownloadProgress::pending("a"));
        store.flush().await.unwrap();
        assert_eq!(settings.writes.load(Ordering::SeqCst), writes);
    }

    #[tokio::test]
    async fn test_flush_reports_write_failure() {
        let settings = Arc::new(MapSettings::default());
        let store = OfflineStateStore::load(settings.clone(), "k").await.unwrap();

        settings.fail_writes.store(true, Ordering::SeqCst);
        store.add_to_download_queue("a");
        assert!(matches!(
            store.flush().await,
            Err(OfflineError::Persistence(_))
        ));

        settings.fail_writes.store(false, Ordering::SeqCst);
        store.flush().await.unwrap();
        assert!(settings.get_string("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_or_newer_blob_starts_empty() {
        let settings = Arc::new(MapSettings::default());
        settings.set_string("k", "{not json").await.unwrap();
        let store = OfflineStateStore::load(settings.clone(), "k").await.unwrap();
        assert_eq!(store.get_downloaded_tracks_count(), 0);

        settings
            .set_string("k", r#"{"version":99,"offlineModeEnabled":true}"#)
            .await
            .unwrap();
        let store = OfflineStateStore::load(settings, "k").await.unwrap();
        assert!(!store.is_offline_mode_enabled());
    }

    #[test]
    fn test_stats() {
        let store = OfflineStateStore::in_memory();
        store.add_downloaded_track(track("a", 100));
        store.add_downloaded_track(track("b", 300));
        store.add_to_download_queue("c");
        store.set_download_progress(DownloadProgress::pending("c"));
        store.set_download_progress(DownloadProgress::downloading("d", 10));
        store.set_download_progress(DownloadProgress::failed("e", "boom"));
        store.set_download_progress(DownloadProgress::paused("f"));

        let stats = store.stats();
        assert_eq!(stats.downloaded_tracks, 2);
        assert_eq!(stats.total_bytes, 400);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.downloading, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.paused, 1);
        assert_eq!(stats.average_track_size(), 200);
    }
}
