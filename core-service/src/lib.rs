//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! settings, clock) and an OpenSubsonic server into the offline core. Desktop
//! apps typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig::builder`](core_runtime::config::CoreConfig::builder) fall back
//! to the reqwest/tokio/SQLite bridges from `bridge-desktop`.
//!
//! ```ignore
//! use core_service::{CoreService, DownloadConfig, SubsonicConfig};
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/path/to/app-data")
//!     .auto_download_starred(true)
//!     .build()?;
//! let subsonic = SubsonicConfig::new("https://music.example.com", "alice", "secret");
//!
//! let core = CoreService::bootstrap(config, subsonic, DownloadConfig::default()).await?;
//! core.offline().set_offline_mode_enabled(true);
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_offline::{DownloadConfig, OfflineDownloads};
pub use core_runtime::config::CoreConfig;
pub use provider_subsonic::SubsonicConfig;

use std::sync::Arc;

use bridge_traits::media::{MediaSource, StarredTracksSource};
use core_offline::{DownloadBridges, DownloadOrchestrator, OfflineStateStore};
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use provider_subsonic::SubsonicConnector;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct ServiceInner {
    config: CoreConfig,
    events: EventBus,
    connector: Arc<SubsonicConnector>,
    offline: OfflineDownloads,
    auto_download: Mutex<Option<JoinHandle<()>>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Load persisted offline state, reconcile the download directory and
    /// start the offline subsystem.
    ///
    /// With `auto_download_starred` enabled in `config.features`, starred
    /// tracks are prefetched whenever offline mode is on.
    ///
    /// # Errors
    ///
    /// Fails when the Subsonic or download configuration is invalid, the
    /// persisted state cannot be read, or the download directory cannot be
    /// created.
    pub async fn bootstrap(
        config: CoreConfig,
        subsonic: SubsonicConfig,
        downloads: DownloadConfig,
    ) -> Result<Self> {
        info!(data_dir = ?config.data_dir, "Bootstrapping offline core");

        let events = EventBus::new(config.event_buffer_size);
        let connector = Arc::new(SubsonicConnector::new(
            config.http_client.clone(),
            subsonic,
        )?);

        let store = OfflineStateStore::load(
            config.settings_store.clone(),
            downloads.persistence_key.clone(),
        )
        .await?;

        let bridges = DownloadBridges {
            media: connector.clone() as Arc<dyn MediaSource>,
            http: config.http_client.clone(),
            fs: config.file_system.clone(),
            clock: config.clock.clone(),
        };
        let orchestrator =
            DownloadOrchestrator::new(downloads, store, bridges, Some(events.clone()))?;
        orchestrator.initialize().await?;

        let offline = OfflineDownloads::new(
            orchestrator,
            connector.clone() as Arc<dyn MediaSource>,
            Some(connector.clone() as Arc<dyn StarredTracksSource>),
            Some(events.clone()),
        );

        let auto_download = if config.features.auto_download_starred {
            Some(offline.spawn_auto_download())
        } else {
            None
        };

        info!(
            downloaded = offline.get_downloaded_tracks_count(),
            offline_mode = offline.is_offline_mode_enabled(),
            auto_download = auto_download.is_some(),
            "Offline core ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                events,
                connector,
                offline,
                auto_download: Mutex::new(auto_download),
            }),
        })
    }

    /// Bootstrap with the desktop bridges rooted at `data_dir`.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap_desktop(
        data_dir: impl Into<std::path::PathBuf>,
        subsonic: SubsonicConfig,
    ) -> Result<Self> {
        let config = CoreConfig::builder()
            .data_dir(data_dir)
            .auto_download_starred(true)
            .build()?;
        Self::bootstrap(config, subsonic, DownloadConfig::default()).await
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Offline downloads API for screens.
    pub fn offline(&self) -> &OfflineDownloads {
        &self.inner.offline
    }

    pub fn connector(&self) -> &SubsonicConnector {
        &self.inner.connector
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to download and offline-mode events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    pub fn is_auto_download_running(&self) -> bool {
        self.inner
            .auto_download
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop automatic prefetch, pause transfers and write the offline state.
    ///
    /// Paused transfers are dropped on the next start.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.inner.auto_download.lock().take() {
            handle.abort();
        }

        let paused = self.inner.offline.pause_all_downloads().await;
        if let Err(e) = self.inner.offline.store().flush().await {
            warn!(error = %e, "Failed to persist offline state on shutdown");
            return Err(e.into());
        }

        info!(paused, "Offline core shut down");
        Ok(())
    }
}
