//! Remote Media Abstractions
//!
//! The offline core never talks to the music server directly. It asks a
//! [`MediaSource`] how to fetch a track's audio and a [`StarredTracksSource`]
//! which tracks the user has marked as favorite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::http::HttpRequest;

/// A track as described by the remote server.
///
/// Identity is the server's track id; the offline core never re-keys it.
/// Fields the core does not understand are kept in `extra` and passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrack {
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
    /// Size of the original file in bytes, when the server reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// File extension of the original file (`mp3`, `flac`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            album: None,
            cover_art: None,
            duration: 0,
            size: None,
            content_type: None,
            suffix: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size = Some(bytes);
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

/// Options for a streaming (not downloading) request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum bitrate in kbps; `None` lets the server decide
    pub max_bit_rate: Option<u32>,
    /// Target format (`mp3`, `opus`, `raw`)
    pub format: Option<String>,
}

/// Resolves how to retrieve a track's audio.
///
/// Downloads always fetch the canonical original file; streaming may transcode.
pub trait MediaSource: Send + Sync {
    /// Build the request that downloads the original file for `track_id`.
    fn download_request(&self, track_id: &str) -> Result<HttpRequest>;

    /// URL the playback engine can stream from.
    fn stream_url(&self, track_id: &str, options: &StreamOptions) -> Result<String>;
}

/// Lists the user's starred (favorite) tracks.
#[async_trait]
pub trait StarredTracksSource: Send + Sync {
    /// Fetch the current starred tracks, optionally scoped to a music folder.
    async fn starred_tracks(&self, music_folder_id: Option<String>) -> Result<Vec<RemoteTrack>>;
}
