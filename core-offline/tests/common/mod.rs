//! Shared in-memory bridges for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
use bridge_traits::media::{MediaSource, RemoteTrack, StreamOptions};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, SettingsStore};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_offline::{
    DownloadBridges, DownloadConfig, DownloadOrchestrator, DownloadStatus, OfflineStateStore,
};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

pub const DATA_DIR: &str = "/data";
pub const DOWNLOAD_DIR: &str = "/data/offline_tracks";
pub const COMPLETED_AT: &str = "2024-05-01T10:00:00.000Z";

// ============================================================================
// File system
// ============================================================================

type FileMap = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory file system rooted at [`DATA_DIR`].
#[derive(Default)]
pub struct MemoryFileSystem {
    files: FileMap,
    dirs: Mutex<HashSet<PathBuf>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).cloned()
    }

    pub fn put_file(&self, path: impl Into<PathBuf>, data: &[u8]) {
        self.files.lock().insert(path.into(), data.to_vec());
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn part_files(&self) -> Vec<PathBuf> {
        self.paths()
            .into_iter()
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("part"))
            .collect()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

struct MemoryWriter {
    path: PathBuf,
    files: FileMap,
    fail: Arc<AtomicBool>,
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::Other,
                "No space left on device",
            )));
        }
        self.files
            .lock()
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn not_found(path: &Path) -> BridgeError {
    BridgeError::NotFound(path.display().to_string())
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_data_directory(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(DATA_DIR))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        if let Some(data) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: data.len() as u64,
                modified_at: None,
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(not_found(path))
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut dirs = self.dirs.lock();
        for ancestor in path.ancestors() {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("write failed".to_string()));
        }
        self.files.lock().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), data);
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect();
        entries.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|dir| dir.parent() == Some(path))
                .cloned(),
        );
        Ok(entries)
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
        self.files.lock().insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            files: self.files.clone(),
            fail: self.fail_writes.clone(),
        }))
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .values
            .lock()
            .get(key)
            .and_then(|value| value.parse().ok()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().contains_key(key))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.values.lock().clear();
        Ok(())
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
enum Route {
    /// Respond immediately with the whole body.
    Body(Bytes),
    /// Hold the body open until the test writes it through the gate.
    Gated { content_length: Option<u64> },
    /// Respond with an HTTP error status.
    Status(u16),
    /// Send `sent` bytes, then fail the read.
    Broken { sent: Bytes, content_length: u64 },
    /// Fail with `status` for the next `failures` requests, then serve `body`.
    Flaky {
        failures: usize,
        status: u16,
        body: Bytes,
    },
}

/// Scripted download server keyed by track id.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<String, Route>>,
    gates: Mutex<HashMap<String, DuplexStream>>,
    requests: Mutex<Vec<String>>,
    open_streams: Arc<AtomicUsize>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, track_id: &str, body: &[u8]) {
        self.routes
            .lock()
            .insert(track_id.to_string(), Route::Body(Bytes::copy_from_slice(body)));
    }

    pub fn gate(&self, track_id: &str, content_length: Option<u64>) {
        self.routes
            .lock()
            .insert(track_id.to_string(), Route::Gated { content_length });
    }

    pub fn fail_with_status(&self, track_id: &str, status: u16) {
        self.routes
            .lock()
            .insert(track_id.to_string(), Route::Status(status));
    }

    pub fn break_after(&self, track_id: &str, sent: &[u8], content_length: u64) {
        self.routes.lock().insert(
            track_id.to_string(),
            Route::Broken {
                sent: Bytes::copy_from_slice(sent),
                content_length,
            },
        );
    }

    pub fn fail_then_serve(&self, track_id: &str, failures: usize, status: u16, body: &[u8]) {
        self.routes.lock().insert(
            track_id.to_string(),
            Route::Flaky {
                failures,
                status,
                body: Bytes::copy_from_slice(body),
            },
        );
    }

    /// Track ids requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, track_id: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|id| id.as_str() == track_id)
            .count()
    }

    pub fn has_open_gate(&self, track_id: &str) -> bool {
        self.gates.lock().contains_key(track_id)
    }

    /// Write `data` into an open gate without closing it.
    pub async fn send(&self, track_id: &str, data: &[u8]) {
        let mut writer = self
            .gates
            .lock()
            .remove(track_id)
            .unwrap_or_else(|| panic!("no open gate for {}", track_id));
        writer.write_all(data).await.unwrap();
        self.gates.lock().insert(track_id.to_string(), writer);
    }

    /// Write `data` and close the gate, ending the body.
    pub async fn finish(&self, track_id: &str, data: &[u8]) {
        let mut writer = self
            .gates
            .lock()
            .remove(track_id)
            .unwrap_or_else(|| panic!("no open gate for {}", track_id));
        writer.write_all(data).await.unwrap();
        writer.shutdown().await.unwrap();
    }
}

fn track_id_from_url(url: &str) -> String {
    url.split("id=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap_or_default()
        .to_string()
}

/// Reader that yields a prefix and then an I/O error.
struct BrokenReader {
    data: Bytes,
    offset: usize,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.offset >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        let end = (self.offset + buf.remaining()).min(self.data.len());
        let chunk = self.data.slice(self.offset..end);
        buf.put_slice(&chunk);
        self.offset = end;
        Poll::Ready(Ok(()))
    }
}

/// Counts streams that are still being read.
struct CountedReader<R> {
    inner: R,
    open: Arc<AtomicUsize>,
}

impl<R> Drop for CountedReader<R> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl FakeHttp {
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn counted<R>(&self, inner: R) -> Box<dyn AsyncRead + Send + Unpin>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Box::new(CountedReader {
            inner,
            open: self.open_streams.clone(),
        })
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        Err(BridgeError::NotAvailable(format!(
            "buffered requests are not scripted: {}",
            request.url
        )))
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream> {
        let track_id = track_id_from_url(&request.url);
        self.requests.lock().push(track_id.clone());

        let route = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&track_id) {
                Some(Route::Flaky {
                    failures,
                    status,
                    body,
                }) => {
                    if *failures > 0 {
                        *failures -= 1;
                        Route::Status(*status)
                    } else {
                        Route::Body(body.clone())
                    }
                }
                Some(route) => route.clone(),
                None => Route::Status(404),
            }
        };

        match route {
            Route::Body(body) => Ok(HttpStream {
                status: 200,
                content_length: Some(body.len() as u64),
                content_type: Some("audio/mpeg".to_string()),
                body: self.counted(std::io::Cursor::new(body.to_vec())),
            }),
            Route::Gated { content_length } => {
                let (client, server) = tokio::io::duplex(256 * 1024);
                self.gates.lock().insert(track_id, server);
                Ok(HttpStream {
                    status: 200,
                    content_length,
                    content_type: Some("audio/flac".to_string()),
                    body: self.counted(client),
                })
            }
            Route::Flaky { .. } => unreachable!("resolved above"),
            Route::Status(status) => Err(BridgeError::Http {
                status,
                message: format!("status {}", status),
            }),
            Route::Broken {
                sent,
                content_length,
            } => Ok(HttpStream {
                status: 200,
                content_length: Some(content_length),
                content_type: None,
                body: self.counted(BrokenReader {
                    data: sent,
                    offset: 0,
                }),
            }),
        }
    }
}

// ============================================================================
// Media source and clock
// ============================================================================

pub struct FakeMedia;

impl MediaSource for FakeMedia {
    fn download_request(&self, track_id: &str) -> Result<HttpRequest> {
        Ok(HttpRequest::get(format!(
            "https://music.test/rest/download?id={}",
            track_id
        )))
    }

    fn stream_url(&self, track_id: &str, options: &StreamOptions) -> Result<String> {
        let mut url = format!("https://music.test/rest/stream?id={}", track_id);
        if let Some(rate) = options.max_bit_rate {
            url.push_str(&format!("&maxBitRate={}", rate));
        }
        Ok(url)
    }
}

pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn track(id: &str) -> RemoteTrack {
    RemoteTrack::new(id, format!("Track {}", id))
        .with_artist("Artist")
        .with_duration(200)
        .with_suffix("mp3")
}

pub fn final_path(id: &str) -> PathBuf {
    Path::new(DOWNLOAD_DIR).join(format!("{}.mp3", id))
}

pub struct Harness {
    pub store: OfflineStateStore,
    pub orchestrator: DownloadOrchestrator,
    pub http: Arc<FakeHttp>,
    pub fs: Arc<MemoryFileSystem>,
    pub settings: Arc<MemorySettings>,
    pub events: EventBus,
}

impl Harness {
    pub async fn new(config: DownloadConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(MemorySettings::default()),
            Arc::new(MemoryFileSystem::new()),
        )
        .await
    }

    /// Build on existing settings and files, as after a restart.
    pub async fn with_parts(
        config: DownloadConfig,
        settings: Arc<MemorySettings>,
        fs: Arc<MemoryFileSystem>,
    ) -> Self {
        let store = OfflineStateStore::load(settings.clone(), config.persistence_key.clone())
            .await
            .unwrap();
        let http = Arc::new(FakeHttp::new());
        let events = EventBus::new(1024);
        let bridges = DownloadBridges {
            media: Arc::new(FakeMedia),
            http: http.clone(),
            fs: fs.clone(),
            clock: Arc::new(FixedClock),
        };
        let orchestrator =
            DownloadOrchestrator::new(config, store.clone(), bridges, Some(events.clone()))
                .unwrap();
        orchestrator.initialize().await.unwrap();

        Self {
            store,
            orchestrator,
            http,
            fs,
            settings,
            events,
        }
    }

    pub fn status(&self, track_id: &str) -> Option<DownloadStatus> {
        self.store
            .get_download_progress(track_id)
            .map(|progress| progress.status)
    }

    pub fn count_with_status(&self, status: DownloadStatus) -> usize {
        self.store
            .all_download_progress()
            .iter()
            .filter(|progress| progress.status == status)
            .count()
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
