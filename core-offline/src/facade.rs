//! # Offline Downloads Façade
//!
//! Policy layer for screens. It keeps the user's starred tracks and, whenever
//! the offline-mode flag or the starred list changes while offline mode is on,
//! submits `starred - downloaded` to the orchestrator. The difference is
//! recomputed from scratch on every change, so unstarring a track only stops
//! future requests; a transfer already running is left to finish.
//!
//! Everything else is a pass-through to the store and orchestrator. Failures
//! are logged and returned to the caller; failures of the automatic prefetch
//! are only logged.

use crate::error::{OfflineError, Result};
use crate::models::{
    BatchSummary, DownloadAcceptance, DownloadOutcome, DownloadProgress, OfflineTrack,
    PlaybackSource,
};
use crate::orchestrator::DownloadOrchestrator;
use crate::stats::StorageStats;
use crate::store::OfflineStateStore;
use bridge_traits::media::{MediaSource, RemoteTrack, StarredTracksSource, StreamOptions};
use core_runtime::events::{CoreEvent, EventBus, OfflineEvent};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

struct FacadeInner {
    store: OfflineStateStore,
    orchestrator: DownloadOrchestrator,
    media: Arc<dyn MediaSource>,
    starred_source: Option<Arc<dyn StarredTracksSource>>,
    starred: watch::Sender<Vec<RemoteTrack>>,
    events: Option<EventBus>,
}

/// Screen-facing offline API. Cloning is cheap.
#[derive(Clone)]
pub struct OfflineDownloads {
    inner: Arc<FacadeInner>,
}

impl fmt::Debug for OfflineDownloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineDownloads")
            .field("store", &self.inner.store)
            .field("orchestrator", &self.inner.orchestrator)
            .field("starred", &self.inner.starred.borrow().len())
            .finish()
    }
}

/// Starred tracks that are not downloaded yet, first occurrence of each id
/// in the given order.
pub fn missing_starred_tracks(
    starred: &[RemoteTrack],
    store: &OfflineStateStore,
) -> Vec<RemoteTrack> {
    let mut seen = HashSet::new();
    starred
        .iter()
        .filter(|track| !track.id.trim().is_empty())
        .filter(|track| seen.insert(track.id.as_str()))
        .filter(|track| !store.is_track_downloaded(&track.id))
        .cloned()
        .collect()
}

fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!(operation, error = %e, "Offline operation failed");
        e
    })
}

impl OfflineDownloads {
    pub fn new(
        orchestrator: DownloadOrchestrator,
        media: Arc<dyn MediaSource>,
        starred_source: Option<Arc<dyn StarredTracksSource>>,
        events: Option<EventBus>,
    ) -> Self {
        let (starred, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(FacadeInner {
                store: orchestrator.store().clone(),
                orchestrator,
                media,
                starred_source,
                starred,
                events,
            }),
        }
    }

    pub fn store(&self) -> &OfflineStateStore {
        &self.inner.store
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.inner.orchestrator
    }

    fn emit(&self, event: OfflineEvent) {
        if let Some(events) = &self.inner.events {
            events.publish(CoreEvent::Offline(event));
        }
    }

    // ========================================================================
    // Offline mode and starred tracks
    // ========================================================================

    pub fn is_offline_mode_enabled(&self) -> bool {
        self.inner.store.is_offline_mode_enabled()
    }

    /// Toggle offline mode. Existing downloads are kept either way.
    pub fn set_offline_mode_enabled(&self, enabled: bool) {
        if self.inner.store.is_offline_mode_enabled() == enabled {
            return;
        }
        self.inner.store.set_offline_mode_enabled(enabled);
        info!(enabled, "Offline mode changed");
        self.emit(OfflineEvent::ModeChanged { enabled });
    }

    /// Replace the known starred tracks.
    pub fn update_starred_tracks(&self, tracks: Vec<RemoteTrack>) {
        let count = tracks.len();
        let changed = self.inner.starred.send_if_modified(|current| {
            if *current == tracks {
                false
            } else {
                *current = tracks;
                true
            }
        });
        debug!(count, changed, "Starred tracks updated");
    }

    pub fn starred_tracks(&self) -> Vec<RemoteTrack> {
        self.inner.starred.borrow().clone()
    }

    /// Fetch starred tracks from the server and replace the known list.
    /// Returns the number of starred tracks.
    #[instrument(skip(self))]
    pub async fn refresh_starred(&self, music_folder_id: Option<String>) -> Result<usize> {
        let Some(source) = &self.inner.starred_source else {
            return logged(
                "refresh_starred",
                Err(OfflineError::Config(
                    "No starred tracks source configured".to_string(),
                )),
            );
        };

        let tracks = logged(
            "refresh_starred",
            source
                .starred_tracks(music_folder_id)
                .await
                .map_err(OfflineError::from),
        )?;

        let count = tracks.len();
        self.update_starred_tracks(tracks);
        Ok(count)
    }

    /// Submit starred tracks that are not downloaded yet, if offline mode is
    /// on. Returns how many were newly queued. Errors are logged, never
    /// returned.
    pub async fn sync_starred(&self) -> usize {
        if !self.inner.store.is_offline_mode_enabled() {
            return 0;
        }

        let starred = self.inner.starred.borrow().clone();
        let missing = missing_starred_tracks(&starred, &self.inner.store);
        if missing.is_empty() {
            return 0;
        }

        let requested = missing.len();
        match self
            .inner
            .orchestrator
            .download_all_starred_tracks(missing)
            .await
        {
            Ok(summary) => {
                if summary.queued > 0 {
                    info!(
                        requested,
                        queued = summary.queued,
                        "Queued starred tracks for offline use"
                    );
                    self.emit(OfflineEvent::AutoDownloadRequested { requested });
                }
                summary.queued
            }
            Err(e) => {
                error!(error = %e, "Automatic download of starred tracks failed");
                0
            }
        }
    }

    /// Run [`sync_starred`](Self::sync_starred) now and after every change of
    /// the offline-mode flag or the starred list.
    ///
    /// The task ends once every handle to this façade is dropped; abort the
    /// returned handle to stop it earlier.
    pub fn spawn_auto_download(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let mut offline_mode = self.inner.store.subscribe_offline_mode();
        let mut starred = self.inner.starred.subscribe();

        tokio::spawn(async move {
            loop {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                OfflineDownloads { inner }.sync_starred().await;

                tokio::select! {
                    changed = offline_mode.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = starred.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Auto-download loop stopped");
        })
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    pub async fn download_track(&self, track: RemoteTrack) -> Result<DownloadAcceptance> {
        logged(
            "download_track",
            self.inner.orchestrator.download_track(track).await,
        )
    }

    pub async fn download_tracks(&self, tracks: Vec<RemoteTrack>) -> Result<BatchSummary> {
        logged(
            "download_tracks",
            self.inner.orchestrator.download_tracks(tracks).await,
        )
    }

    pub async fn download_all_starred_tracks(
        &self,
        tracks: Vec<RemoteTrack>,
    ) -> Result<BatchSummary> {
        logged(
            "download_all_starred_tracks",
            self.inner
                .orchestrator
                .download_all_starred_tracks(tracks)
                .await,
        )
    }

    pub async fn remove_downloaded_track(&self, track_id: &str) -> Result<()> {
        logged(
            "remove_downloaded_track",
            self.inner.orchestrator.remove_downloaded_track(track_id).await,
        )
    }

    pub async fn clear_all_downloads(&self) -> Result<usize> {
        logged(
            "clear_all_downloads",
            self.inner.orchestrator.clear_all_downloads().await,
        )
    }

    pub async fn pause_all_downloads(&self) -> usize {
        self.inner.orchestrator.pause_all_downloads().await
    }

    pub async fn resume_all_downloads(&self) -> usize {
        self.inner.orchestrator.resume_all_downloads().await
    }

    pub fn clear_failed_downloads(&self) -> usize {
        self.inner.orchestrator.clear_failed_downloads()
    }

    pub async fn wait_for_download(&self, track_id: &str) -> DownloadOutcome {
        self.inner.orchestrator.wait_for_download(track_id).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_download_progress(&self, track_id: &str) -> Option<DownloadProgress> {
        self.inner.orchestrator.get_download_progress(track_id)
    }

    pub fn all_download_progress(&self) -> Vec<DownloadProgress> {
        self.inner.store.all_download_progress()
    }

    pub fn is_track_downloading(&self, track_id: &str) -> bool {
        self.inner.orchestrator.is_track_downloading(track_id)
    }

    pub fn is_track_downloaded(&self, track_id: &str) -> bool {
        self.inner.store.is_track_downloaded(track_id)
    }

    pub fn get_downloaded_track(&self, track_id: &str) -> Option<OfflineTrack> {
        self.inner.store.get_downloaded_track(track_id)
    }

    pub fn get_downloaded_tracks_list(&self) -> Vec<OfflineTrack> {
        self.inner.store.get_downloaded_tracks_list()
    }

    pub fn get_total_download_size(&self) -> u64 {
        self.inner.store.get_total_download_size()
    }

    pub fn get_downloaded_tracks_count(&self) -> usize {
        self.inner.store.get_downloaded_tracks_count()
    }

    pub fn download_queue(&self) -> Vec<String> {
        self.inner.store.download_queue()
    }

    pub fn stats(&self) -> StorageStats {
        self.inner.store.stats()
    }

    /// Local file when the track is downloaded, otherwise a stream URL.
    pub fn playback_source(
        &self,
        track_id: &str,
        options: &StreamOptions,
    ) -> Result<PlaybackSource> {
        if let Some(track) = self.inner.store.get_downloaded_track(track_id) {
            return Ok(PlaybackSource::Local(track.path));
        }

        let url = logged(
            "playback_source",
            self.inner
                .media
                .stream_url(track_id, options)
                .map_err(OfflineError::from),
        )?;
        Ok(PlaybackSource::Remote(url))
    }
}
