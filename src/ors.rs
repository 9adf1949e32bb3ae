//! openrouteservice-style HTTP adapter for distance matrices.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::Credentials;
use crate::error::Error;
use crate::matrix::MatrixRequest;
use crate::traits::MatrixTransport;

pub const DEFAULT_USER_AGENT: &str = concat!("matrix-batch/", env!("CARGO_PKG_VERSION"));

/// Longest response body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct OrsMatrixClient {
    url: String,
    client: reqwest::blocking::Client,
}

impl OrsMatrixClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&credentials.api_key)
            .map_err(|_| Error::Config("api_key is not a valid header value".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|err| Error::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            url: credentials.url,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, err: &reqwest::Error) -> Error {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Error::Transport {
            url: self.url.clone(),
            status: err.status().map(|status| status.as_u16()),
            message,
        }
    }
}

impl MatrixTransport for OrsMatrixClient {
    fn send(&self, request: &MatrixRequest) -> Result<serde_json::Value, Error> {
        debug!(url = %self.url, locations = request.locations.len(), "posting matrix request");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .map_err(|err| self.transport_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Transport {
                url: self.url.clone(),
                status: Some(status.as_u16()),
                message: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let text = response.text().map_err(|err| self.transport_error(&err))?;
        serde_json::from_str(&text)
            .map_err(|err| Error::MalformedResponse(format!("body is not JSON: {err}")))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
