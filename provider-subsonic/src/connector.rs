//! OpenSubsonic API connector
//!
//! Builds authenticated REST URLs and implements the media traits the offline
//! core consumes.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::media::{MediaSource, RemoteTrack, StarredTracksSource, StreamOptions};
use core_runtime::logging::redact_url_credentials;
use md5::{Digest, Md5};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::SubsonicConfig;
use crate::error::{Result, SubsonicError};
use crate::types::{ApiError, Envelope, Starred2};

/// Timeout for JSON API calls. Downloads are bounded by the orchestrator.
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Length of the random salt sent as `s`.
const SALT_LENGTH: usize = 12;

/// OpenSubsonic API connector
///
/// # Example
///
/// ```ignore
/// use provider_subsonic::{SubsonicConfig, SubsonicConnector};
///
/// let config = SubsonicConfig::new("https://music.example.com", "alice", "secret");
/// let connector = SubsonicConnector::new(http_client, config)?;
/// let starred = connector.get_starred(None).await?;
/// ```
pub struct SubsonicConnector {
    http_client: Arc<dyn HttpClient>,
    config: SubsonicConfig,
}

impl SubsonicConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, config: SubsonicConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &SubsonicConfig {
        &self.config
    }

    /// `t` parameter: lowercase hex md5 of `password + salt`.
    pub fn auth_token(password: &str, salt: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(password.as_bytes());
        hasher.update(salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn new_salt() -> String {
        let mut salt = uuid::Uuid::new_v4().simple().to_string();
        salt.truncate(SALT_LENGTH);
        salt
    }

    /// Common parameters every request carries: user, salt, token, version,
    /// client and format.
    fn auth_params(&self) -> Vec<(&'static str, String)> {
        let salt = Self::new_salt();
        let token = Self::auth_token(&self.config.password, &salt);

        vec![
            ("u", self.config.username.clone()),
            ("t", token),
            ("s", salt),
            ("v", self.config.api_version.clone()),
            ("c", self.config.client_name.clone()),
            ("f", "json".to_string()),
        ]
    }

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .cloned()
            .chain(self.auth_params())
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}/rest/{}?{}",
            self.config.normalized_base_url(),
            endpoint,
            query
        )
    }

    /// URL that returns the original, untranscoded file.
    pub fn download_url(&self, track_id: &str) -> String {
        self.endpoint_url("download", &[("id", track_id.to_string())])
    }

    pub fn build_stream_url(&self, track_id: &str, options: &StreamOptions) -> String {
        let mut params = vec![("id", track_id.to_string())];
        if let Some(max_bit_rate) = options.max_bit_rate {
            params.push(("maxBitRate", max_bit_rate.to_string()));
        }
        if let Some(format) = &options.format {
            params.push(("format", format.clone()));
        }
        self.endpoint_url("stream", &params)
    }

    /// Execute a JSON API call and return the payload keys of a successful envelope.
    #[instrument(skip(self, params))]
    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Map<String, Value>> {
        let url = self.endpoint_url(endpoint, params);
        debug!(url = %redact_url_credentials(&url), "Subsonic request");

        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Subsonic request failed");
            return Err(SubsonicError::Http {
                status: response.status,
            });
        }

        let envelope: Envelope = serde_json::from_slice(&response.body)
            .map_err(|e| SubsonicError::ParseError(e.to_string()))?;
        let body = envelope.response;

        if !body.is_ok() {
            let error = body.error.unwrap_or(ApiError {
                code: 0,
                message: "Unknown error".to_string(),
            });
            warn!(code = error.code, message = %error.message, "Subsonic API error");
            return Err(SubsonicError::from_api(error.code, error.message));
        }

        Ok(body.payload)
    }

    /// Checks connectivity and credentials.
    pub async fn ping(&self) -> Result<()> {
        self.get_json("ping", &[]).await.map(|_| ())
    }

    /// Starred songs, optionally scoped to a music folder.
    #[instrument(skip(self))]
    pub async fn get_starred(&self, music_folder_id: Option<&str>) -> Result<Vec<RemoteTrack>> {
        let mut params = Vec::new();
        if let Some(folder) = music_folder_id {
            params.push(("musicFolderId", folder.to_string()));
        }

        let mut payload = self.get_json("getStarred2", &params).await?;

        let starred: Starred2 = match payload.remove("starred2") {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SubsonicError::ParseError(format!("starred2: {}", e)))?,
            None => Starred2::default(),
        };

        info!(count = starred.song.len(), "Fetched starred tracks");
        Ok(starred.song)
    }
}

impl MediaSource for SubsonicConnector {
    fn download_request(&self, track_id: &str) -> BridgeResult<HttpRequest> {
        if track_id.is_empty() {
            return Err(SubsonicError::InvalidConfig("Track id cannot be empty".to_string()).into());
        }
        Ok(HttpRequest::get(self.download_url(track_id)))
    }

    fn stream_url(&self, track_id: &str, options: &StreamOptions) -> BridgeResult<String> {
        Ok(self.build_stream_url(track_id, options))
    }
}

#[async_trait]
impl StarredTracksSource for SubsonicConnector {
    async fn starred_tracks(&self, music_folder_id: Option<String>) -> BridgeResult<Vec<RemoteTrack>> {
        Ok(self.get_starred(music_folder_id.as_deref()).await?)
    }
}
