//! Subsonic response envelope types
//!
//! Every JSON response is wrapped as `{"subsonic-response": {...}}` with a
//! `status` of `ok` or `failed`. Payload keys vary per endpoint and are kept in
//! `payload` for the caller to pick out.

use bridge_traits::RemoteTrack;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "subsonic-response")]
    pub response: ResponseBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub status: String,

    pub version: String,

    /// OpenSubsonic servers report their implementation name here
    #[serde(default, rename = "type")]
    pub server_type: Option<String>,

    #[serde(default)]
    pub error: Option<ApiError>,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ResponseBody {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// `getStarred2` payload. Only songs matter for offline downloads.
#[derive(Debug, Default, Deserialize)]
pub struct Starred2 {
    #[serde(default)]
    pub song: Vec<RemoteTrack>,
}
