use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::BatchError;

/// An open response whose body has not been read yet.
pub struct FetchResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

pub trait Transport: Send + Sync {
    /// Issues the request and returns once headers are in. Non-2xx statuses
    /// are errors.
    fn fetch(&self, url: &str) -> Result<FetchResponse, BatchError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, BatchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|err| BatchError::HttpClient(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| BatchError::HttpClient(err.to_string()))?;

        Ok(Self { client })
    }

    fn handle_status(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, BatchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(BatchError::TransportStatus {
            status: response.status().as_u16(),
            url: url.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<FetchResponse, BatchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BatchError::Transport(err.to_string()))?;
        let response = Self::handle_status(url, response)?;
        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

pub fn default_user_agent() -> String {
    format!("batchget/{}", env!("CARGO_PKG_VERSION"))
}
