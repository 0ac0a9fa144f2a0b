use std::env;
use std::time::Duration;

use crate::error::{ApiError, Result};

pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Loopback address of the development backend as seen from this target.
/// The Android emulator reaches the host through 10.0.2.2.
#[cfg(target_os = "android")]
pub const LOCAL_BASE_URL: &str = "http://10.0.2.2:8000";
#[cfg(not(target_os = "android"))]
pub const LOCAL_BASE_URL: &str = "http://127.0.0.1:8000";

const BASE_URL_VAR: &str = "ALLAWEE_API_BASE_URL";
const PREFIX_VAR: &str = "ALLAWEE_API_PREFIX";
const TIMEOUT_VAR: &str = "ALLAWEE_API_TIMEOUT_MS";

/// Client configuration, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    api_prefix: String,
    default_timeout: Duration,
}

impl ClientConfig {
    /// Build a config for `base_url` with the default prefix and timeout.
    ///
    /// The URL must be absolute http(s); a trailing slash is dropped.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Read overrides from the environment (and `.env`, if present).
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match env::var(BASE_URL_VAR) {
            Ok(url) => Self::new(&url)?,
            Err(_) => Self::default(),
        };
        if let Ok(prefix) = env::var(PREFIX_VAR) {
            config = config.with_api_prefix(&prefix);
        }
        if let Ok(ms) = env::var(TIMEOUT_VAR) {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("{TIMEOUT_VAR} is not a number: {ms}")))?;
            config = config.with_default_timeout(Duration::from_millis(ms));
        }
        Ok(config)
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// `base_url + api_prefix + path`. `path` is expected to start with `/`.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: LOCAL_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ApiError::Config(format!("invalid base URL {trimmed:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ApiError::Config(format!(
            "unsupported base URL scheme {other:?}"
        ))),
    }
}
