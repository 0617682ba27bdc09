//! # Download Orchestrator
//!
//! Turns download requests into files on disk, live progress and records in
//! the [`OfflineStateStore`].
//!
//! - Requests are accepted into a FIFO queue and drained by a worker pool
//!   bounded by a semaphore (`max_concurrent_downloads`).
//! - Each transfer streams into `<id>.<generation>.part` and is renamed to
//!   its final name only after the byte count has been checked, so a partial
//!   file is never mistaken for a download.
//! - Every dispatch gets a fresh generation and cancellation token. Pause and
//!   clear invalidate the generation, so a transfer that finishes late can
//!   never write stale state back into the store.
//! - Failures mark the track `failed` and never affect sibling transfers.
//!
//! Calls that accept work return once the request is queued, not when the
//! transfer finishes. Use [`DownloadOrchestrator::wait_for_download`] or the
//! event bus to observe completion.

use crate::config::DownloadConfig;
use crate::error::{OfflineError, Result};
use crate::models::{
    BatchSummary, DownloadAcceptance, DownloadOutcome, DownloadProgress, DownloadStatus,
    OfflineTrack,
};
use crate::store::OfflineStateStore;
use bridge_traits::{
    http::HttpClient,
    media::{MediaSource, RemoteTrack},
    storage::FileSystemAccess,
    time::Clock,
};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::logging::strip_path;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const CHUNK_SIZE: usize = 64 * 1024;
const PART_EXTENSION: &str = "part";
const FALLBACK_EXTENSION: &str = "audio";

/// Host capabilities the orchestrator needs.
#[derive(Clone)]
pub struct DownloadBridges {
    pub media: Arc<dyn MediaSource>,
    pub http: Arc<dyn HttpClient>,
    pub fs: Arc<dyn FileSystemAccess>,
    pub clock: Arc<dyn Clock>,
}

struct ActiveTransfer {
    generation: u64,
    token: CancellationToken,
    track: RemoteTrack,
}

#[derive(Default)]
struct DispatchState {
    /// Accepted but not yet dispatched, keyed by track id
    pending: HashMap<String, RemoteTrack>,
    /// Holding a worker slot
    active: HashMap<String, ActiveTransfer>,
    paused: bool,
    last_generation: u64,
}

impl DispatchState {
    fn is_current(&self, track_id: &str, generation: u64) -> bool {
        self.active
            .get(track_id)
            .is_some_and(|transfer| transfer.generation == generation)
    }

    fn is_tracked(&self, track_id: &str) -> bool {
        self.pending.contains_key(track_id) || self.active.contains_key(track_id)
    }
}

/// Everything a spawned transfer task owns.
struct Transfer {
    track: RemoteTrack,
    generation: u64,
    token: CancellationToken,
    permit: OwnedSemaphorePermit,
    directory: PathBuf,
}

struct Inner {
    config: DownloadConfig,
    store: OfflineStateStore,
    bridges: DownloadBridges,
    events: Option<EventBus>,
    slots: Arc<Semaphore>,
    // Lock order: `dispatch` before the store's internal lock. The store never
    // calls back into the orchestrator.
    dispatch: Mutex<DispatchState>,
    download_dir: RwLock<Option<PathBuf>>,
}

/// Download service shared by the façade and the host. Cloning is cheap.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dispatch = self.inner.dispatch.lock();
        f.debug_struct("DownloadOrchestrator")
            .field("pending", &dispatch.pending.len())
            .field("active", &dispatch.active.len())
            .field("paused", &dispatch.paused)
            .field("max_concurrent", &self.inner.config.max_concurrent_downloads)
            .finish()
    }
}

impl DownloadOrchestrator {
    /// Create a new orchestrator. Call [`initialize`](Self::initialize) before
    /// requesting downloads.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineError::Config`] if `config` does not validate.
    pub fn new(
        config: DownloadConfig,
        store: OfflineStateStore,
        bridges: DownloadBridges,
        events: Option<EventBus>,
    ) -> Result<Self> {
        config.validate().map_err(OfflineError::Config)?;
        let slots = Arc::new(Semaphore::new(config.max_concurrent_downloads));

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                store,
                bridges,
                events,
                slots,
                dispatch: Mutex::new(DispatchState::default()),
                download_dir: RwLock::new(None),
            }),
        })
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &OfflineStateStore {
        &self.inner.store
    }

    /// Directory holding downloaded files; `None` before `initialize`.
    pub fn download_directory(&self) -> Option<PathBuf> {
        self.inner.download_dir.read().clone()
    }

    fn require_download_dir(&self) -> Result<PathBuf> {
        self.download_directory()
            .ok_or(OfflineError::NotInitialized)
    }

    /// Number of transfers holding a worker slot.
    pub fn active_downloads(&self) -> usize {
        self.inner.dispatch.lock().active.len()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.dispatch.lock().paused
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Prepare the download directory and reconcile state left by a previous
    /// session.
    ///
    /// - Creates the download directory under the app data directory.
    /// - Drops queued ids that have no live request. Transfers interrupted by
    ///   a restart are not resumed; they must be requested again.
    /// - Deletes orphaned `.part` files.
    /// - With `verify_on_startup`, drops records whose file is missing or has
    ///   the wrong size.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing download orchestrator");

        let data_dir = self.inner.bridges.fs.get_data_directory().await.map_err(|e| {
            error!("Failed to get data directory: {}", e);
            OfflineError::Storage(format!("Failed to get data directory: {}", e))
        })?;
        let directory = data_dir.join(&self.inner.config.download_directory);

        self.inner
            .bridges
            .fs
            .create_dir_all(&directory)
            .await
            .map_err(|e| {
                error!("Failed to create download directory: {}", e);
                OfflineError::Storage(format!("Failed to create download directory: {}", e))
            })?;

        *self.inner.download_dir.write() = Some(directory.clone());

        let dropped = self.drop_stale_queue_entries();
        let orphans = self.remove_orphaned_parts(&directory).await?;
        let invalid = if self.inner.config.verify_on_startup {
            self.verify_downloads().await.len()
        } else {
            0
        };

        if let Err(e) = self.inner.store.flush().await {
            warn!(error = %e, "Could not persist reconciled offline state");
        }

        info!(
            directory = ?directory,
            dropped_queue_entries = dropped,
            orphaned_parts = orphans,
            invalid_records = invalid,
            "Download orchestrator initialized"
        );
        Ok(())
    }

    fn drop_stale_queue_entries(&self) -> usize {
        let dispatch = self.inner.dispatch.lock();
        let stale: Vec<String> = self
            .inner
            .store
            .download_queue()
            .into_iter()
            .filter(|id| !dispatch.pending.contains_key(id))
            .collect();

        for track_id in &stale {
            debug!(track_id = %track_id, "Dropping queued download from previous session");
            self.inner.store.remove_from_download_queue(track_id);
        }
        stale.len()
    }

    async fn remove_orphaned_parts(&self, directory: &Path) -> Result<usize> {
        let live: HashSet<PathBuf> = {
            let dispatch = self.inner.dispatch.lock();
            dispatch
                .active
                .iter()
                .map(|(id, transfer)| part_path(directory, id, transfer.generation))
                .collect()
        };

        let entries = self
            .inner
            .bridges
            .fs
            .list_directory(directory)
            .await
            .map_err(OfflineError::storage)?;

        let mut removed = 0;
        for entry in entries {
            let is_part = entry.extension().and_then(|ext| ext.to_str()) == Some(PART_EXTENSION);
            if !is_part || live.contains(&entry) {
                continue;
            }
            if self.delete_file_best_effort(&entry).await {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop records whose file is missing or whose size differs from the
    /// recorded one. Returns the ids that were dropped.
    ///
    /// Files that cannot be inspected for other reasons are left alone.
    #[instrument(skip(self))]
    pub async fn verify_downloads(&self) -> Vec<String> {
        let mut dropped = Vec::new();

        for track in self.inner.store.get_downloaded_tracks_list() {
            match self.inner.bridges.fs.metadata(&track.path).await {
                Ok(meta) if !meta.is_directory && meta.size == track.size => continue,
                Ok(meta) if meta.is_directory => {
                    warn!(track_id = %track.id, "Download path is a directory, dropping record");
                }
                Ok(meta) => {
                    warn!(
                        track_id = %track.id,
                        expected = track.size,
                        actual = meta.size,
                        "Downloaded file has wrong size, dropping record"
                    );
                    self.delete_file_best_effort(&track.path).await;
                }
                Err(e) if e.is_not_found() => {
                    warn!(track_id = %track.id, "Downloaded file missing, dropping record");
                }
                Err(e) => {
                    warn!(track_id = %track.id, error = %e, "Could not verify downloaded file");
                    continue;
                }
            }

            self.inner.store.remove_downloaded_track(&track.id);
            dropped.push(track.id);
        }

        dropped
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Request a download of `track`.
    ///
    /// Returns once the request is accepted. Already downloaded and already
    /// queued tracks are reported as such and cause no work.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn download_track(&self, track: RemoteTrack) -> Result<DownloadAcceptance> {
        validate_track(&track)?;
        self.require_download_dir()?;

        let acceptance = self.enqueue(track);
        if acceptance == DownloadAcceptance::Queued {
            self.pump();
        }
        Ok(acceptance)
    }

    /// Request downloads for a batch, in order.
    ///
    /// Nothing is queued if any track in the batch is invalid.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn download_tracks(&self, tracks: Vec<RemoteTrack>) -> Result<BatchSummary> {
        for track in &tracks {
            validate_track(track)?;
        }
        self.require_download_dir()?;

        let mut summary = BatchSummary::default();
        for track in tracks {
            summary.record(self.enqueue(track));
        }
        if summary.queued > 0 {
            self.pump();
        }

        info!(
            queued = summary.queued,
            already_downloaded = summary.already_downloaded,
            already_pending = summary.already_pending,
            "Batch download requested"
        );
        Ok(summary)
    }

    /// Same contract as [`download_tracks`](Self::download_tracks); used for
    /// automatic prefetch of starred tracks.
    pub async fn download_all_starred_tracks(
        &self,
        tracks: Vec<RemoteTrack>,
    ) -> Result<BatchSummary> {
        debug!(count = tracks.len(), "Prefetching starred tracks");
        self.download_tracks(tracks).await
    }

    fn enqueue(&self, track: RemoteTrack) -> DownloadAcceptance {
        let track_id = track.id.clone();
        {
            let mut dispatch = self.inner.dispatch.lock();
            if self.inner.store.is_track_downloaded(&track_id) {
                debug!(track_id = %track_id, "Track already downloaded");
                return DownloadAcceptance::AlreadyDownloaded;
            }
            if dispatch.is_tracked(&track_id) {
                debug!(track_id = %track_id, "Track already queued");
                return DownloadAcceptance::AlreadyPending;
            }

            dispatch.pending.insert(track_id.clone(), track);
            self.inner.store.add_to_download_queue(&track_id);
            self.inner
                .store
                .set_download_progress(DownloadProgress::pending(&track_id));
        }

        debug!(track_id = %track_id, "Download queued");
        self.emit(DownloadEvent::Queued { track_id });
        DownloadAcceptance::Queued
    }

    /// Withdraw a request that has not started yet. In-flight transfers are
    /// not affected. Returns `true` if a request was withdrawn.
    pub fn cancel_queued_download(&self, track_id: &str) -> bool {
        let mut dispatch = self.inner.dispatch.lock();
        if dispatch.pending.remove(track_id).is_none() {
            return false;
        }
        self.inner.store.remove_from_download_queue(track_id);
        self.inner.store.remove_download_progress(track_id);
        debug!(track_id = %track_id, "Queued download withdrawn");
        true
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Start queued transfers while worker slots are free.
    fn pump(&self) {
        let Some(directory) = self.download_directory() else {
            return;
        };

        loop {
            let transfer = {
                let mut dispatch = self.inner.dispatch.lock();
                if dispatch.paused {
                    return;
                }

                let next = self
                    .inner
                    .store
                    .download_queue()
                    .into_iter()
                    .find(|id| dispatch.pending.contains_key(id));
                let Some(track_id) = next else {
                    return;
                };
                let Ok(permit) = self.inner.slots.clone().try_acquire_owned() else {
                    return;
                };
                let Some(track) = dispatch.pending.remove(&track_id) else {
                    return;
                };

                dispatch.last_generation += 1;
                let generation = dispatch.last_generation;
                let token = CancellationToken::new();
                dispatch.active.insert(
                    track_id.clone(),
                    ActiveTransfer {
                        generation,
                        token: token.clone(),
                        track: track.clone(),
                    },
                );
                self.inner.store.remove_from_download_queue(&track_id);
                self.inner
                    .store
                    .set_download_progress(DownloadProgress::downloading(&track_id, 0));

                Transfer {
                    track,
                    generation,
                    token,
                    permit,
                    directory: directory.clone(),
                }
            };

            tokio::spawn(self.clone().run_transfer(transfer));
        }
    }

    async fn run_transfer(self, transfer: Transfer) {
        let Transfer {
            track,
            generation,
            token,
            permit,
            directory,
        } = transfer;

        let part = part_path(&directory, &track.id, generation);
        let destination = final_path(&directory, &track);

        info!(track_id = %track.id, generation, "Starting download");
        self.emit(DownloadEvent::Started {
            track_id: track.id.clone(),
        });

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(OfflineError::Cancelled),
            result = self.download_with_retry(&track, generation, &part, &destination) => result,
        };

        match result {
            Ok(size) => {
                self.commit_success(&track, generation, destination, size)
                    .await
            }
            Err(e) => self.commit_failure(&track.id, generation, &part, e).await,
        }

        drop(permit);
        self.pump();
    }

    /// Download with automatic retry logic.
    async fn download_with_retry(
        &self,
        track: &RemoteTrack,
        generation: u64,
        part: &Path,
        destination: &Path,
    ) -> Result<u64> {
        let attempts = self.inner.config.max_retry_attempts + 1;
        let timeout = self.inner.config.download_timeout;
        let mut reported = 0u8;
        let mut attempt = 1;

        loop {
            debug!(
                "Download attempt {}/{} for track {}",
                attempt, attempts, track.id
            );

            let result = match tokio::time::timeout(
                timeout,
                self.transfer_once(track, generation, part, &mut reported),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(OfflineError::Timeout(timeout)),
            };

            match result {
                Ok(size) => {
                    self.inner
                        .bridges
                        .fs
                        .rename(part, destination)
                        .await
                        .map_err(|e| {
                            OfflineError::Storage(format!(
                                "Failed to move download into place: {}",
                                e
                            ))
                        })?;
                    return Ok(size);
                }
                Err(e) if attempt < attempts && e.is_transient() => {
                    warn!("Download attempt {} failed: {}", attempt, e);
                    tokio::time::sleep(self.inner.config.retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Stream one attempt into `part`. Returns the number of bytes written.
    async fn transfer_once(
        &self,
        track: &RemoteTrack,
        generation: u64,
        part: &Path,
        reported: &mut u8,
    ) -> Result<u64> {
        let request = self
            .inner
            .bridges
            .media
            .download_request(&track.id)?
            .timeout(self.inner.config.download_timeout);

        let stream = self
            .inner
            .bridges
            .http
            .download_stream(request)
            .await
            .map_err(OfflineError::from_transfer)?;

        let expected = stream.content_length.filter(|len| *len > 0);
        let mut body = stream.body;
        let mut file = self
            .inner
            .bridges
            .fs
            .open_write_stream(part)
            .await
            .map_err(OfflineError::storage)?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = body.read(&mut buffer).await.map_err(|e| {
                OfflineError::Network(format!("Read failed after {} bytes: {}", written, e))
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .await
                .map_err(OfflineError::storage)?;
            written += read as u64;

            if let Some(total) = expected {
                self.report_progress(&track.id, generation, written, total, reported);
            }
        }

        file.flush().await.map_err(OfflineError::storage)?;
        file.shutdown().await.map_err(OfflineError::storage)?;
        drop(file);

        if written == 0 {
            return Err(OfflineError::Network("Server sent an empty body".to_string()));
        }
        if let Some(total) = expected {
            if written != total {
                return Err(OfflineError::Network(format!(
                    "Transfer ended after {} of {} bytes",
                    written, total
                )));
            }
        }

        let on_disk = self
            .inner
            .bridges
            .fs
            .metadata(part)
            .await
            .map_err(OfflineError::storage)?
            .size;
        if on_disk != written {
            return Err(OfflineError::Storage(format!(
                "Wrote {} bytes but {} are on disk",
                written, on_disk
            )));
        }

        Ok(written)
    }

    /// Publish progress when it advanced by at least the configured step.
    /// Progress never moves backwards, even across retries.
    fn report_progress(
        &self,
        track_id: &str,
        generation: u64,
        written: u64,
        total: u64,
        reported: &mut u8,
    ) {
        let percent = (written.saturating_mul(100) / total).min(100) as u8;
        if percent <= *reported
            || (percent < 100 && percent - *reported < self.inner.config.progress_step_percent)
        {
            return;
        }

        {
            let dispatch = self.inner.dispatch.lock();
            if !dispatch.is_current(track_id, generation) {
                return;
            }
            self.inner
                .store
                .set_download_progress(DownloadProgress::downloading(track_id, percent));
        }

        *reported = percent;
        self.emit(DownloadEvent::Progress {
            track_id: track_id.to_string(),
            percent,
        });
    }

    async fn commit_success(
        &self,
        track: &RemoteTrack,
        generation: u64,
        path: PathBuf,
        size: u64,
    ) {
        let record = OfflineTrack::from_remote(
            track,
            path.clone(),
            size,
            self.inner.bridges.clock.rfc3339(),
        );

        let (committed, superseded) = {
            let mut dispatch = self.inner.dispatch.lock();
            if dispatch.is_current(&track.id, generation) {
                dispatch.active.remove(&track.id);
                // Record first so the track is never absent from both maps.
                self.inner.store.add_downloaded_track(record);
                self.inner.store.remove_download_progress(&track.id);
                (true, false)
            } else {
                (false, self.inner.store.is_track_downloaded(&track.id))
            }
        };

        if committed {
            info!(track_id = %track.id, size, "Download completed");
            self.emit(DownloadEvent::Completed {
                track_id: track.id.clone(),
                size,
            });
        } else {
            debug!(track_id = %track.id, "Discarding download finished after pause or clear");
            if !superseded {
                self.delete_file_best_effort(&path).await;
            }
        }
    }

    async fn commit_failure(
        &self,
        track_id: &str,
        generation: u64,
        part: &Path,
        error: OfflineError,
    ) {
        // Remove partial bytes before the failure becomes visible.
        self.delete_file_best_effort(part).await;

        let message = error.to_string();
        let recorded = {
            let mut dispatch = self.inner.dispatch.lock();
            if dispatch.is_current(track_id, generation) {
                dispatch.active.remove(track_id);
                self.inner
                    .store
                    .set_download_progress(DownloadProgress::failed(track_id, &message));
                true
            } else {
                false
            }
        };

        if recorded {
            error!(track_id = %track_id, error = %message, "Download failed");
            self.emit(DownloadEvent::Failed {
                track_id: track_id.to_string(),
                message,
            });
        } else {
            debug!(track_id = %track_id, "Download stopped: {}", message);
        }
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Delete the downloaded file for `track_id` and forget the record.
    ///
    /// A not-yet-started request for the id is withdrawn as well. Removing a
    /// track that is not downloaded is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_downloaded_track(&self, track_id: &str) -> Result<()> {
        self.cancel_queued_download(track_id);

        let Some(track) = self.inner.store.get_downloaded_track(track_id) else {
            debug!("Track not downloaded, nothing to remove");
            return Ok(());
        };

        self.delete_file_best_effort(&track.path).await;
        self.inner.store.remove_downloaded_track(track_id);

        info!(size = track.size, "Removed downloaded track");
        self.emit(DownloadEvent::Removed {
            track_id: track_id.to_string(),
        });
        Ok(())
    }

    /// Stop all transfers, forget every request and delete every downloaded
    /// file. Returns the number of downloaded tracks removed.
    ///
    /// Files are deleted before the records are cleared.
    #[instrument(skip(self))]
    pub async fn clear_all_downloads(&self) -> Result<usize> {
        let known = {
            let mut dispatch = self.inner.dispatch.lock();
            stop_all(&mut dispatch);
            self.inner.store.get_downloaded_tracks_list()
        };

        let mut deleted = HashSet::new();
        for track in known {
            self.delete_file_best_effort(&track.path).await;
            deleted.insert(track.path);
        }

        let removed = {
            let mut dispatch = self.inner.dispatch.lock();
            stop_all(&mut dispatch);
            self.inner.store.clear_all_downloads()
        };

        // Transfers that committed while files were being deleted.
        for track in removed.iter().filter(|t| !deleted.contains(&t.path)) {
            self.delete_file_best_effort(&track.path).await;
        }

        if let Err(e) = self.inner.store.flush().await {
            warn!(error = %e, "Could not persist cleared offline state");
        }

        info!(removed = removed.len(), "Cleared all downloads");
        self.emit(DownloadEvent::Cleared {
            removed: removed.len(),
        });
        Ok(removed.len())
    }

    // ========================================================================
    // Pause / resume
    // ========================================================================

    /// Stop every in-flight transfer and put it back at the head of the queue
    /// with status `paused`. Nothing is dispatched until
    /// [`resume_all_downloads`](Self::resume_all_downloads).
    ///
    /// Paused transfers restart from the first byte. Returns the number of
    /// transfers that were stopped.
    #[instrument(skip(self))]
    pub async fn pause_all_downloads(&self) -> usize {
        let paused: Vec<String> = {
            let mut dispatch = self.inner.dispatch.lock();
            dispatch.paused = true;

            let mut transfers: Vec<ActiveTransfer> =
                dispatch.active.drain().map(|(_, transfer)| transfer).collect();
            transfers.sort_by_key(|transfer| transfer.generation);

            let ids: Vec<String> = transfers.iter().map(|t| t.track.id.clone()).collect();
            for transfer in transfers {
                transfer.token.cancel();
                self.inner
                    .store
                    .set_download_progress(DownloadProgress::paused(&transfer.track.id));
                dispatch
                    .pending
                    .insert(transfer.track.id.clone(), transfer.track);
            }
            self.inner.store.requeue_front(&ids);
            ids
        };

        info!(paused = paused.len(), "Paused all downloads");
        for track_id in &paused {
            self.emit(DownloadEvent::Paused {
                track_id: track_id.clone(),
            });
        }
        paused.len()
    }

    /// Lift a pause and dispatch queued transfers. Returns the number of
    /// paused transfers put back to `pending`.
    #[instrument(skip(self))]
    pub async fn resume_all_downloads(&self) -> usize {
        let resumed = {
            let mut dispatch = self.inner.dispatch.lock();
            dispatch.paused = false;

            let ids: Vec<String> = dispatch
                .pending
                .keys()
                .filter(|id| {
                    self.inner
                        .store
                        .get_download_progress(id)
                        .is_some_and(|p| p.status == DownloadStatus::Paused)
                })
                .cloned()
                .collect();
            for track_id in &ids {
                self.inner
                    .store
                    .set_download_progress(DownloadProgress::pending(track_id));
            }
            ids.len()
        };

        info!(resumed, "Resumed downloads");
        self.pump();
        resumed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_download_progress(&self, track_id: &str) -> Option<DownloadProgress> {
        self.inner.store.get_download_progress(track_id)
    }

    /// `true` while the track is queued or transferring.
    pub fn is_track_downloading(&self, track_id: &str) -> bool {
        self.inner
            .store
            .get_download_progress(track_id)
            .is_some_and(|progress| progress.status.is_active())
    }

    /// Forget `failed` progress records. Returns how many were dropped.
    pub fn clear_failed_downloads(&self) -> usize {
        let cleared = self.inner.store.clear_failed_progress();
        debug!(cleared, "Cleared failed downloads");
        cleared
    }

    /// Wait until `track_id` reaches a terminal state.
    ///
    /// Resolves immediately for tracks that are downloaded, failed, paused or
    /// unknown.
    pub async fn wait_for_download(&self, track_id: &str) -> DownloadOutcome {
        let mut changes = self.inner.store.subscribe();

        loop {
            changes.borrow_and_update();

            match self.inner.store.get_download_progress(track_id) {
                Some(progress) if progress.status.is_active() => {}
                Some(progress) if progress.status == DownloadStatus::Failed => {
                    return DownloadOutcome::Failed(progress.error.unwrap_or_default());
                }
                Some(progress) if progress.status == DownloadStatus::Paused => {
                    return DownloadOutcome::Paused;
                }
                _ => {
                    return match self.inner.store.get_downloaded_track(track_id) {
                        Some(track) => DownloadOutcome::Completed(track),
                        None => DownloadOutcome::NotTracked,
                    };
                }
            }

            if changes.changed().await.is_err() {
                return DownloadOutcome::NotTracked;
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn emit(&self, event: DownloadEvent) {
        if let Some(events) = &self.inner.events {
            events.publish(CoreEvent::Download(event));
        }
    }

    /// Delete `path`, treating a missing file as success. Returns `true` if a
    /// file was deleted.
    async fn delete_file_best_effort(&self, path: &Path) -> bool {
        let label = path.to_string_lossy();
        match self.inner.bridges.fs.delete_file(path).await {
            Ok(()) => {
                debug!(file = strip_path(&label), "Deleted file");
                true
            }
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(file = strip_path(&label), error = %e, "Failed to delete file");
                false
            }
        }
    }
}

/// Cancel every running transfer and forget every queued request.
fn stop_all(dispatch: &mut DispatchState) {
    for (track_id, transfer) in dispatch.active.drain() {
        debug!(track_id = %track_id, "Cancelling transfer");
        transfer.token.cancel();
    }
    dispatch.pending.clear();
}

fn validate_track(track: &RemoteTrack) -> Result<()> {
    if track.id.trim().is_empty() {
        return Err(OfflineError::InvalidTrack(format!(
            "track '{}' has an empty id",
            track.title
        )));
    }
    Ok(())
}

/// Reduce a server id to characters safe in any file name.
fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

fn part_path(directory: &Path, track_id: &str, generation: u64) -> PathBuf {
    directory.join(format!(
        "{}.{}.{}",
        sanitize_file_component(track_id),
        generation,
        PART_EXTENSION
    ))
}

fn final_path(directory: &Path, track: &RemoteTrack) -> PathBuf {
    let extension = track
        .suffix
        .as_deref()
        .filter(|suffix| {
            !suffix.is_empty()
                && !suffix.eq_ignore_ascii_case(PART_EXTENSION)
                && suffix.chars().all(|ch| ch.is_ascii_alphanumeric())
        })
        .unwrap_or(FALLBACK_EXTENSION);
    directory.join(format!(
        "{}.{}",
        sanitize_file_component(&track.id),
        extension.to_ascii_lowercase()
    ))
}
