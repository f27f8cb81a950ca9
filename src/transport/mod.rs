//! Transport contract between the client and the backend HTTP API
//!
//! A [`Request`] names the expected status codes; any other status, or a
//! connection failure, turns into an error carrying the status and body for
//! diagnostics. No retries and no timeouts are applied at this layer.

mod http;

pub use http::HttpTransport;

use crate::Result;
use async_trait::async_trait;

pub use reqwest::Method;

/// A request relative to the backend base URL.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Absolute path, e.g. `/api/v2/write`
    pub path: String,
    /// Query parameters, percent-encoded by the transport
    pub query: Vec<(String, String)>,
    /// Extra headers; these override defaults but never the authorization header
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Status codes treated as success
    pub expected: Vec<u16>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            expected: vec![200, 204],
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn expect(mut self, statuses: &[u16]) -> Self {
        self.expected = statuses.to_vec();
        self
    }

    pub fn accepts(&self, status: u16) -> bool {
        self.expected.contains(&status)
    }
}

/// Fully collected response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

/// Executes requests against the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and collect the full response body.
    ///
    /// Fails when the connection cannot be established or the response
    /// status is not in `request.expected`.
    async fn request(&self, request: Request) -> Result<Response>;
}
