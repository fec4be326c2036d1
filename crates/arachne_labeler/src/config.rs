//! Configuration for the labeling pipeline.

use crate::error::{LabelerError, LabelerResult};
use std::time::Duration;

/// Default endpoint of the moderation model.
pub const DEFAULT_MODERATION_API_URL: &str = "https://api.anthropic.com/v1/messages";
/// Default moderation model.
pub const DEFAULT_MODERATION_MODEL: &str = "claude-3-haiku-20240307";
/// Default service for blob downloads.
pub const DEFAULT_BLOB_SERVICE_URL: &str = "https://bsky.social";

/// Configuration for the moderation client and blob fetcher.
#[derive(Debug, Clone)]
pub struct LabelerConfig {
    /// Moderation API endpoint.
    pub moderation_api_url: String,
    /// Moderation API key.
    pub moderation_api_key: Option<String>,
    /// Model name sent with each request.
    pub moderation_model: String,
    /// Base URL of the XRPC service serving blobs.
    pub blob_service_url: String,
    /// Timeout for each outgoing request.
    pub request_timeout: Duration,
}

impl LabelerConfig {
    /// Creates a configuration with default endpoints and no API key.
    pub fn new() -> Self {
        Self {
            moderation_api_url: DEFAULT_MODERATION_API_URL.to_string(),
            moderation_api_key: None,
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            blob_service_url: DEFAULT_BLOB_SERVICE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the moderation API endpoint.
    pub fn with_moderation_api_url(mut self, url: impl Into<String>) -> Self {
        self.moderation_api_url = url.into();
        self
    }

    /// Sets the moderation API key.
    pub fn with_moderation_api_key(mut self, key: impl Into<String>) -> Self {
        self.moderation_api_key = Some(key.into());
        self
    }

    /// Sets the moderation model.
    pub fn with_moderation_model(mut self, model: impl Into<String>) -> Self {
        self.moderation_model = model.into();
        self
    }

    /// Sets the blob service base URL.
    pub fn with_blob_service_url(mut self, url: impl Into<String>) -> Self {
        self.blob_service_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks that the configuration can be used for live moderation.
    pub fn validate(&self) -> LabelerResult<()> {
        if self.moderation_api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LabelerError::Config("no moderation API key".into()));
        }
        if self.moderation_model.is_empty() {
            return Err(LabelerError::Config("no moderation model".into()));
        }
        Ok(())
    }
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self::new()
    }
}
