//! Download configuration

use std::time::Duration;

/// Settings key under which the offline snapshot is stored.
pub const DEFAULT_PERSISTENCE_KEY: &str = "offline-storage";

/// Configuration for the download orchestrator.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Number of simultaneous transfers (default: 3)
    pub max_concurrent_downloads: usize,

    /// Timeout for a single transfer attempt (default: 300s)
    pub download_timeout: Duration,

    /// Extra attempts after a transient failure (default: 0)
    pub max_retry_attempts: usize,

    /// Delay before the first retry; doubled for each further one (default: 500ms)
    pub retry_base_delay: Duration,

    /// Directory for downloaded files, relative to the app data dir
    pub download_directory: String,

    /// Drop records whose file is missing or truncated during `initialize`
    pub verify_on_startup: bool,

    /// Minimum percent change between two progress updates (default: 1)
    pub progress_step_percent: u8,

    /// Key of the persisted snapshot in the settings store
    pub persistence_key: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            download_timeout: Duration::from_secs(300),
            max_retry_attempts: 0,
            retry_base_delay: Duration::from_millis(500),
            download_directory: "offline_tracks".to_string(),
            verify_on_startup: true,
            progress_step_percent: 1,
            persistence_key: DEFAULT_PERSISTENCE_KEY.to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent downloads.
    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    /// Set per-attempt download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set number of automatic retries and the base backoff delay.
    pub fn with_retries(mut self, attempts: usize, base_delay: Duration) -> Self {
        self.max_retry_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    /// Set download directory name.
    pub fn with_download_directory(mut self, dir: impl Into<String>) -> Self {
        self.download_directory = dir.into();
        self
    }

    pub fn with_verify_on_startup(mut self, enabled: bool) -> Self {
        self.verify_on_startup = enabled;
        self
    }

    pub fn with_progress_step(mut self, percent: u8) -> Self {
        self.progress_step_percent = percent;
        self
    }

    pub fn with_persistence_key(mut self, key: impl Into<String>) -> Self {
        self.persistence_key = key.into();
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.retry_base_delay.saturating_mul(2u32.pow(exponent))
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        if self.download_directory.trim().is_empty() {
            return Err("download_directory cannot be empty".to_string());
        }

        if self.progress_step_percent == 0 || self.progress_step_percent > 100 {
            return Err("progress_step_percent must be between 1 and 100".to_string());
        }

        if self.persistence_key.is_empty() {
            return Err("persistence_key cannot be empty".to_string());
        }

        Ok(())
    }
}
