//! Backend connection settings.

use std::time::Duration;

use url::Url;

use crate::error::{ApiError, ApiResult};

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl BackendConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://127.0.0.1:3000";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Parses a base URL. Only `http` and `https` are accepted.
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ApiError::configuration(format!("invalid backend URL {:?}", base_url)).with_source(e)
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::configuration(format!(
                "backend URL must be http or https, got {:?}",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins an absolute API path (`/api/...`) onto the base URL.
    ///
    /// Any path prefix on the base URL is kept.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}
