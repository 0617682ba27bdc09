//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the offline core and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that is implemented differently per platform (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations and streaming downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for downloaded audio
//!
//! ### Persistence
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value storage that survives
//!   process death
//!
//! ### Remote Media
//! - [`MediaSource`](media::MediaSource) - Resolves download/stream requests for a track id
//! - [`StarredTracksSource`](media::StarredTracksSource) - Lists the user's favorite tracks
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! include context (file paths, HTTP status) in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that a single implementation can be
//! shared between the download workers and UI observers behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStream};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         todo!()
//!     }
//!
//!     async fn download_stream(&self, request: HttpRequest) -> Result<HttpStream> {
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod media;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy};
pub use media::{MediaSource, RemoteTrack, StarredTracksSource, StreamOptions};
pub use storage::{FileMetadata, FileSystemAccess, SettingsStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
