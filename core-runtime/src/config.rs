//! # Core Configuration Module
//!
//! The configuration system uses a builder to construct a [`CoreConfig`] holding
//! every host bridge the offline core needs. Validation is fail-fast: a missing
//! capability is reported at build time with an actionable message instead of
//! surfacing later as a failed download.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore` - persists the offline state blob
//! - `HttpClient` - streams audio from the server
//! - `FileSystemAccess` - writes downloaded files
//!
//! With the `desktop-shims` feature, desktop implementations (SQLite settings,
//! reqwest, tokio fs) are injected for whatever is not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .data_dir("/path/to/app-data")
//!     .settings_store(Arc::new(MySettingsStore))
//!     .http_client(Arc::new(MyHttpClient))
//!     .file_system(Arc::new(MyFileSystem))
//!     .auto_download_starred(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SettingsStore, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Core configuration for the offline download core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Application data directory; the settings database lives here on desktop
    pub data_dir: PathBuf,

    pub http_client: Arc<dyn HttpClient>,

    pub file_system: Arc<dyn FileSystemAccess>,

    pub settings_store: Arc<dyn SettingsStore>,

    /// Time source for download timestamps
    pub clock: Arc<dyn Clock>,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("data_dir", &self.data_dir)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Feature toggles for optional behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the starred-tracks auto download loop when offline mode is enabled
    pub auto_download_starred: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            auto_download_starred: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required to persist offline state. \
         Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
         Mobile: inject platform-native settings (UserDefaults/DataStore/MMKV).",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Handle, Runtime};

    let path = data_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so build on a scratch thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Ok(Arc::new(bridge_desktop::ReqwestHttpClient::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::capability_missing(
        "HttpClient",
        "HttpClient implementation is required to download tracks. \
         Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
         Mobile: inject URLSession/OkHttp-backed clients.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(data_dir: &Path) -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::with_data_directory(
        data_dir.to_path_buf(),
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_data_dir: &Path) -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::capability_missing(
        "FileSystemAccess",
        "FileSystemAccess implementation is required to store downloaded tracks. \
         Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
         Mobile: inject a sandboxed documents-directory implementation.",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    data_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the application data directory (required).
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Overrides the time source (defaults to [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn auto_download_starred(mut self, enabled: bool) -> Self {
        self.features.auto_download_starred = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - `Error::Config` when the data directory is missing or a value is invalid
    /// - `Error::CapabilityMissing` when a required bridge was not provided and no
    ///   platform default is available
    pub fn build(self) -> Result<CoreConfig> {
        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&data_dir)?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&data_dir)?,
        };

        let config = CoreConfig {
            data_dir,
            http_client,
            file_system,
            settings_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
