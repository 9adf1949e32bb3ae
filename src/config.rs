//! Run configuration: service credentials and batching tunables.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::matrix::IndexMode;

/// Default destinations per matrix request.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Default number of attempts per request.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default exponential backoff base.
pub const DEFAULT_BACKOFF_BASE: u32 = 2;

/// Service credentials, loaded once at process start.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    /// Matrix endpoint, e.g. `https://api.openrouteservice.org/v2/matrix/driving-car`.
    #[serde(alias = "endpoint")]
    pub url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: url.into(),
        }
    }

    /// Load `{"api_key": "...", "url": "..."}` from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let credentials: Self = serde_json::from_str(&text).map_err(|err| {
            Error::Config(format!("invalid credentials file {}: {}", path.display(), err))
        })?;
        credentials.validate()?;
        Ok(credentials)
    }

    /// Load from `MATRIX_API_KEY` and `MATRIX_URL`.
    pub fn from_env() -> Result<Self, Error> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };
        let credentials = Self::new(read("MATRIX_API_KEY")?, read("MATRIX_URL")?);
        credentials.validate()?;
        Ok(credentials)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("api_key is empty".to_string()));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "url must be an http(s) endpoint, got {:?}",
                self.url
            )));
        }
        Ok(())
    }
}

/// Tunables for one batch run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum destinations per matrix request.
    pub chunk_size: usize,
    /// Attempts per request before the run fails.
    pub max_retries: u32,
    /// Failed attempt `n` waits `backoff_unit * backoff_base^n`.
    pub backoff_base: u32,
    pub backoff_unit: Duration,
    /// Pause between consecutive chunk requests (service rate limit).
    pub inter_request_delay: Duration,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    pub index_mode: IndexMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit: Duration::from_secs(1),
            inter_request_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
            index_mode: IndexMode::Implicit,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".to_string()));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        if self.backoff_base == 0 {
            return Err(Error::Config("backoff_base must be at least 1".to_string()));
        }
        Ok(())
    }
}
