//! API client configuration.

use std::time::Duration;
use url::Url;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// API client configuration.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL all API paths are appended to
    pub base_url: String,
    /// Timeout for JSON API calls
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Timeout for the whole media PUT, body included
    pub upload_timeout: Duration,
    /// Send analytics events to `/analytics/track`
    pub analytics_enabled: bool,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(300),
            analytics_enabled: true,
        }
    }
}

impl ApiClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        let config = Self {
            base_url: std::env::var("NEXTPLAY_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("NEXTPLAY_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("NEXTPLAY_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            upload_timeout: Duration::from_secs(
                std::env::var("NEXTPLAY_UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            analytics_enabled: std::env::var("NEXTPLAY_ANALYTICS_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn validate(&self) -> ApiResult<()> {
        let url = Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::config(format!(
                "NEXTPLAY_API_URL must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// Absolute URL for an API path such as `/videos/upload-session`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::remove_var("NEXTPLAY_API_URL");
        std::env::remove_var("NEXTPLAY_API_TIMEOUT_SECS");
        std::env::remove_var("NEXTPLAY_ANALYTICS_ENABLED");
        let config = ApiClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(300));
        assert!(config.analytics_enabled);
    }

    #[test]
    #[serial]
    fn test_config_from_env_overrides() {
        std::env::set_var("NEXTPLAY_API_URL", "https://api.nextplay.test/v1/");
        std::env::set_var("NEXTPLAY_API_TIMEOUT_SECS", "7");
        std::env::set_var("NEXTPLAY_ANALYTICS_ENABLED", "false");
        let config = ApiClientConfig::from_env().unwrap();
        std::env::remove_var("NEXTPLAY_API_URL");
        std::env::remove_var("NEXTPLAY_API_TIMEOUT_SECS");
        std::env::remove_var("NEXTPLAY_ANALYTICS_ENABLED");

        assert_eq!(config.timeout, Duration::from_secs(7));
        assert!(!config.analytics_enabled);
        assert_eq!(
            config.endpoint("/videos/upload-session"),
            "https://api.nextplay.test/v1/videos/upload-session"
        );
    }

    #[test]
    #[serial]
    fn test_config_rejects_bad_url() {
        std::env::set_var("NEXTPLAY_API_URL", "not a url");
        let result = ApiClientConfig::from_env();
        std::env::remove_var("NEXTPLAY_API_URL");
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));

        let config = ApiClientConfig::default().with_base_url("ftp://files.example");
        assert!(matches!(config.validate(), Err(ApiError::Config(_))));
    }
}
