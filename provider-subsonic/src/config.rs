//! Subsonic connection settings

use crate::error::{Result, SubsonicError};

/// Client name sent as the `c` parameter.
pub const DEFAULT_CLIENT_NAME: &str = "offline-core";

/// Protocol version sent as the `v` parameter.
pub const DEFAULT_API_VERSION: &str = "1.16.1";

/// Server address and credentials.
#[derive(Clone)]
pub struct SubsonicConfig {
    /// Server root, e.g. `https://music.example.com`
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub client_name: String,
    pub api_version: String,
}

impl std::fmt::Debug for SubsonicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsonicConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_name", &self.client_name)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl SubsonicConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Base URL without trailing slashes.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.normalized_base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SubsonicError::InvalidConfig(
                "Base URL must start with http:// or https://".to_string(),
            ));
        }

        if self.username.is_empty() {
            return Err(SubsonicError::InvalidConfig(
                "Username cannot be empty".to_string(),
            ));
        }

        if self.client_name.is_empty() || self.api_version.is_empty() {
            return Err(SubsonicError::InvalidConfig(
                "Client name and API version are required".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() {
        let config = SubsonicConfig::new("https://music.example.com/", "alice", "secret")
            .with_client_name("my-app");

        assert_eq!(config.normalized_base_url(), "https://music.example.com");
        assert_eq!(config.client_name, "my-app");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SubsonicConfig::new("music.example.com", "alice", "x")
            .validate()
            .is_err());
        assert!(SubsonicConfig::new("https://h", "", "x").validate().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = SubsonicConfig::new("https://h", "alice", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
