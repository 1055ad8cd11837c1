//! Configuration types for search backend clients.

/// Default OpenSearch URL.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9200";

/// Connection settings for a search backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the cluster, e.g. `http://localhost:9200`.
    pub url: String,
    /// Bypass any system proxy when connecting.
    pub disable_proxy: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            disable_proxy: true,
        }
    }
}

impl BackendConfig {
    /// Create a config for the given URL with default options.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
