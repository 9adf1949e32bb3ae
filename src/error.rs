//! Error kinds for batch distance runs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad local coordinate data. Never retried.
    #[error("malformed coordinate {input:?}: {reason}")]
    MalformedCoordinate { input: String, reason: String },

    /// Network failure, timeout or non-success HTTP status.
    #[error("request to {url} failed{}: {message}", status_suffix(.status))]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The service answered, but not with the expected matrix.
    #[error("malformed matrix response: {0}")]
    MalformedResponse(String),

    /// Every attempt of a retried request failed; `source` is the last failure.
    #[error("giving up after {attempts} attempts: {source}")]
    RunFailed {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("table error: {0}")]
    Table(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run was cancelled")]
    Cancelled,

    #[error("pipeline has already been started")]
    AlreadyStarted,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" with status {code}")).unwrap_or_default()
}

impl Error {
    /// Whether a fresh attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MalformedResponse(_))
    }

    /// Whether the failure (or the last retried failure) came from the
    /// service refusing us: HTTP 403 or 429.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Transport {
                status: Some(403 | 429),
                ..
            } => true,
            Self::RunFailed { source, .. } => source.is_rate_limited(),
            _ => false,
        }
    }
}
