//! Raw exchange capture.
//!
//! Every call made by a [`TestClient`](crate::TestClient) goes through an
//! [`ExchangePipeline`]: the [`RawExchangeCapture`] runs first and keeps an
//! immutable snapshot of the last request and the last response, then the
//! registered [`ExchangeHook`]s are notified in order, then the transport is invoked.

use bytes::Bytes;
use http::{Method, StatusCode};
use tracing::debug;
use url::Url;

use crate::transport::{
    Headers, Transport, TransportError, TransportRequest, TransportResponse, find_header,
};

/// Snapshot of the last request sent by a client.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    url: Url,
    method: Method,
    headers: Headers,
    body: Bytes,
}

impl CapturedRequest {
    fn snapshot(request: &TransportRequest) -> Self {
        Self {
            url: request.url.clone(),
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        }
    }

    /// The absolute URL, including the query string.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request headers, case preserved as supplied.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw request body, empty when nothing was sent.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The raw query string, if any.
    pub fn query_string(&self) -> Option<&str> {
        self.url.query()
    }

    /// The `Content-Type` request header, if any.
    pub fn content_type(&self) -> Option<&str> {
        find_header(&self.headers, "content-type")
    }
}

/// Snapshot of the last response received by a client.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl CapturedResponse {
    fn snapshot(response: TransportResponse) -> Self {
        let TransportResponse {
            status,
            headers,
            body,
        } = response;
        Self {
            status,
            headers,
            body,
        }
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers as received.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw response body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The response body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The `Content-Type` response header, if any.
    pub fn content_type(&self) -> Option<&str> {
        find_header(&self.headers, "content-type")
    }
}

/// Observer notified around each transport call.
///
/// Hooks only observe: they receive shared references to the snapshots and
/// cannot alter the exchange. All methods default to doing nothing.
pub trait ExchangeHook: std::fmt::Debug + Send + Sync {
    /// Called once the request has been captured, before the transport runs.
    fn on_request(&mut self, _request: &CapturedRequest) {}

    /// Called once the transport completed and the response has been captured.
    fn on_response(&mut self, _request: &CapturedRequest, _response: &CapturedResponse) {}

    /// Called when the transport failed; no response is captured in that case.
    fn on_failure(&mut self, _request: &CapturedRequest, _error: &TransportError) {}
}

/// Holds the "last request" and "last response" slots of a client.
///
/// A new request clears the response slot, so a response is never paired
/// with an older request.
#[derive(Debug, Default)]
pub struct RawExchangeCapture {
    last_request: Option<CapturedRequest>,
    last_response: Option<CapturedResponse>,
}

impl RawExchangeCapture {
    /// The last captured request.
    pub fn last_request(&self) -> Option<&CapturedRequest> {
        self.last_request.as_ref()
    }

    /// The last captured response, `None` if the last call failed.
    pub fn last_response(&self) -> Option<&CapturedResponse> {
        self.last_response.as_ref()
    }

    fn record_request(&mut self, request: &TransportRequest) -> &CapturedRequest {
        self.last_response = None;
        self.last_request.insert(CapturedRequest::snapshot(request))
    }

    fn record_response(&mut self, response: TransportResponse) -> &CapturedResponse {
        debug_assert!(
            self.last_request.is_some(),
            "a response must follow a captured request"
        );
        self.last_response
            .insert(CapturedResponse::snapshot(response))
    }
}

/// Ordered capture pipeline: capture first, then the extra hooks, then the transport.
#[derive(Debug, Default)]
pub(crate) struct ExchangePipeline {
    capture: RawExchangeCapture,
    hooks: Vec<Box<dyn ExchangeHook>>,
}

impl ExchangePipeline {
    pub(crate) fn new(hooks: Vec<Box<dyn ExchangeHook>>) -> Self {
        Self {
            capture: RawExchangeCapture::default(),
            hooks,
        }
    }

    pub(crate) fn capture(&self) -> &RawExchangeCapture {
        &self.capture
    }

    /// Runs one exchange; the transport error is returned untouched.
    pub(crate) async fn execute<T>(
        &mut self,
        transport: &T,
        request: TransportRequest,
    ) -> Result<CapturedResponse, TransportError>
    where
        T: Transport,
    {
        let captured = self.capture.record_request(&request);
        debug!(method = %captured.method, url = %captured.url, "request captured");
        for hook in &mut self.hooks {
            hook.on_request(captured);
        }

        let outcome = transport.send(request).await;

        match outcome {
            Ok(response) => {
                let response = self.capture.record_response(response).clone();
                debug!(status = %response.status, "response captured");
                if let Some(request) = self.capture.last_request() {
                    for hook in &mut self.hooks {
                        hook.on_response(request, &response);
                    }
                }
                Ok(response)
            }
            Err(error) => {
                debug!(%error, "transport failed, no response captured");
                if let Some(request) = self.capture.last_request() {
                    for hook in &mut self.hooks {
                        hook.on_failure(request, &error);
                    }
                }
                Err(error)
            }
        }
    }
}
