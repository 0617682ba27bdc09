//! # Event Bus System
//!
//! Typed notifications for the offline core, published on a
//! `tokio::sync::broadcast` channel. Store queries remain the source of truth;
//! events let hosts refresh UI without polling.
//!
//! ```text
//! ┌──────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Orchestrator ├─────────>│ EventBus  ├────────────>│ Subscriber │
//! └──────────────┘          │(broadcast)│             └────────────┘
//! ┌──────────────┐   emit   │           │  subscribe  ┌────────────┐
//! │   Facade     ├─────────>│           ├────────────>│ Subscriber │
//! └──────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Queued {
//!     track_id: "tr-1".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.track_id(), Some("tr-1"));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress events are frequent; subscribers that fall further behind than this
/// receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Per-track transfer lifecycle
    Download(DownloadEvent),
    /// Offline mode and auto-download policy
    Offline(OfflineEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Offline(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Completed { .. })
            | CoreEvent::Download(DownloadEvent::Cleared { .. })
            | CoreEvent::Offline(OfflineEvent::ModeChanged { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Paused { .. }) => EventSeverity::Warning,
            _ => EventSeverity::Debug,
        }
    }

    /// Track the event refers to, if it is about a single track.
    pub fn track_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Download(e) => e.track_id(),
            CoreEvent::Offline(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Download Events
// ============================================================================

/// Transfer lifecycle of a single track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// Accepted into the download queue.
    Queued { track_id: String },
    /// A worker slot picked the track up.
    Started { track_id: String },
    /// Whole-percent progress changed.
    Progress { track_id: String, percent: u8 },
    /// File published and recorded as downloaded.
    Completed {
        track_id: String,
        /// Bytes on disk
        size: u64,
    },
    /// Transfer failed; the track keeps a `failed` progress record.
    Failed { track_id: String, message: String },
    /// Transfer stopped by a global pause and re-queued.
    Paused { track_id: String },
    /// Downloaded file and record removed.
    Removed { track_id: String },
    /// All downloads cleared.
    Cleared {
        /// Number of downloaded tracks that were removed
        removed: usize,
    },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Queued { .. } => "Download queued",
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Paused { .. } => "Download paused",
            DownloadEvent::Removed { .. } => "Downloaded track removed",
            DownloadEvent::Cleared { .. } => "All downloads cleared",
        }
    }

    pub fn track_id(&self) -> Option<&str> {
        match self {
            DownloadEvent::Queued { track_id }
            | DownloadEvent::Started { track_id }
            | DownloadEvent::Progress { track_id, .. }
            | DownloadEvent::Completed { track_id, .. }
            | DownloadEvent::Failed { track_id, .. }
            | DownloadEvent::Paused { track_id }
            | DownloadEvent::Removed { track_id } => Some(track_id),
            DownloadEvent::Cleared { .. } => None,
        }
    }
}

// ============================================================================
// Offline Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum OfflineEvent {
    /// Offline mode flag toggled.
    ModeChanged { enabled: bool },
    /// Starred tracks missing locally were submitted for download.
    AutoDownloadRequested {
        /// Size of the starred-minus-downloaded difference
        requested: usize,
    },
}

impl OfflineEvent {
    fn description(&self) -> &str {
        match self {
            OfflineEvent::ModeChanged { .. } => "Offline mode changed",
            OfflineEvent::AutoDownloadRequested { .. } => "Starred tracks submitted for download",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel.
///
/// Cloning is cheap; all clones publish to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers; callers that treat
    /// events as best-effort use [`EventBus::publish`].
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes an event, ignoring the absence of subscribers.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let downloads_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Download(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Events about a single track only.
    pub fn for_track(self, track_id: impl Into<String>) -> Self {
        let track_id = track_id.into();
        self.filter(move |event| event.track_id() == Some(track_id.as_str()))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
