//! Transport seam between the [`TestClient`](crate::TestClient) and the network.
//!
//! The client never talks to the network itself: it builds a [`TransportRequest`],
//! hands it to a [`Transport`] and records what comes back. The default
//! implementation, [`ReqwestTransport`], is backed by [`reqwest`].
//!
//! # Custom transport
//!
//! ```rust
//! use reqdoc_core::{Transport, TransportError, TransportRequest, TransportResponse};
//! use http::StatusCode;
//!
//! #[derive(Debug)]
//! struct AlwaysNoContent;
//!
//! impl Transport for AlwaysNoContent {
//!     async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
//!         Ok(TransportResponse::new(StatusCode::NO_CONTENT))
//!     }
//! }
//! ```

use std::future::Future;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::debug;
use url::Url;

/// Ordered header list, names kept exactly as supplied.
pub type Headers = IndexMap<String, String>;

/// Finds a header value with a case-insensitive name lookup.
pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A fully built request, ready to be sent by a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, including the query string.
    pub url: Url,
    /// Request headers in the order they were supplied.
    pub headers: Headers,
    /// Raw request body, empty when nothing is sent.
    pub body: Bytes,
}

/// The response returned by a [`Transport`] once the exchange completed.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The response status code.
    pub status: StatusCode,
    /// Response headers as received.
    pub headers: Headers,
    /// Raw response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response without headers or body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Failure of the underlying network call.
///
/// The client surfaces this error unchanged and never retries.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum TransportError {
    /// Error from the `reqwest` client (connection refused, DNS failure, timeout...).
    #[display("HTTP transport error: {_0}")]
    Reqwest(reqwest::Error),

    /// Error reported by a custom transport implementation.
    #[display("HTTP transport error: {message}")]
    #[from(skip)]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl TransportError {
    /// Creates an error from a free-form message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Performs the actual HTTP exchange.
///
/// Implementations must not alter the request and must report network failures
/// as [`TransportError`]. Timeouts and cancellation belong to the implementation.
pub trait Transport {
    /// Sends the request and waits for the complete response.
    fn send(
        &self,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing, possibly customized, `reqwest` client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut request = reqwest::Request::new(method, url);
        let req_headers = request.headers_mut();
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::other(format!("invalid header name {name}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::other(format!("invalid header value: {err}")))?;
            req_headers.append(name, value);
        }
        if !body.is_empty() {
            *request.body_mut() = Some(reqwest::Body::from(body));
        }

        debug!(?request, "sending...");
        let response = self.client.execute(request).await?;
        debug!(?response, "...receiving");

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Flattens a [`HeaderMap`], joining repeated headers with `", "`.
fn collect_headers(header_map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in header_map {
        let value = String::from_utf8_lossy(value.as_bytes());
        match headers.entry(name.as_str().to_owned()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }
    headers
}
