//! Error types for the Subsonic provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Subsonic error code for "requested data was not found".
const CODE_NOT_FOUND: i32 = 70;

#[derive(Error, Debug)]
pub enum SubsonicError {
    /// The server answered with `status="failed"`
    #[error("Subsonic API error {code}: {message}")]
    Api { code: i32, message: String },

    /// Wrong username/password or token (codes 40, 41, 44)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Non-2xx HTTP status
    #[error("HTTP error (status {status})")]
    Http { status: u16 },

    /// Response body was not a valid Subsonic envelope
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

impl SubsonicError {
    /// Map a failed-envelope error code to the matching variant.
    pub fn from_api(code: i32, message: String) -> Self {
        match code {
            40 | 41 | 44 => SubsonicError::AuthenticationFailed(message),
            _ => SubsonicError::Api { code, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, SubsonicError>;

impl From<SubsonicError> for BridgeError {
    fn from(error: SubsonicError) -> Self {
        match error {
            SubsonicError::Api { code, message } if code == CODE_NOT_FOUND => {
                BridgeError::NotFound(message)
            }
            SubsonicError::Http { status } => BridgeError::Http {
                status,
                message: "Subsonic request failed".to_string(),
            },
            SubsonicError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
