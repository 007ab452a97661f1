use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::capture::{CapturedRequest, CapturedResponse, ExchangePipeline, RawExchangeCapture};
use crate::docs::{DocumentationNormalizer, ExampleMetadata};
use crate::transport::{Headers, ReqwestTransport, Transport, TransportRequest, find_header};

mod builder;
pub use self::builder::TestClientBuilder;

mod error;
pub use self::error::TestClientError;

mod params;
pub use self::params::RequestParams;

/// HTTP client for tests that records the last exchange and documents it on demand.
///
/// Each call goes through the transport with the exchange capture attached, so
/// the last request and the last response are always available afterwards.
/// A client belongs to a single test case; `&mut self` keeps calls on one
/// instance sequential.
///
/// # Example
///
/// ```rust,no_run
/// use reqdoc_core::{DocumentationMetadata, Headers, RequestParams, TestClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = TestClient::builder().with_port(3000).build()?;
/// let mut metadata = DocumentationMetadata::documented();
///
/// client
///     .get(
///         &mut metadata,
///         "/widgets",
///         RequestParams::form_pairs([("color", "red")]),
///         Headers::new(),
///     )
///     .await?;
///
/// assert_eq!(client.status()?.as_u16(), 200);
/// assert_eq!(client.query_string()?, "color=red");
/// assert_eq!(metadata.requests.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestClient<T = ReqwestTransport> {
    transport: T,
    base_url: Url,
    pipeline: ExchangePipeline,
    normalizer: DocumentationNormalizer,
}

impl TestClient {
    /// Creates a builder with the default configuration.
    pub fn builder() -> TestClientBuilder {
        TestClientBuilder::default()
    }
}

impl<T> TestClient<T>
where
    T: Transport,
{
    /// Sends a request and captures the exchange.
    ///
    /// `path` is appended to the base URL and may carry its own query string.
    /// Form parameters are merged into the query of `GET`, `HEAD` and `DELETE`
    /// requests and url-encoded into the body otherwise. A `Content-Type`
    /// matching the parameters is added unless `headers` already carries one.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be built, or with
    /// [`TestClientError::Transport`] when the network call fails. Transport
    /// failures are returned unchanged and never retried.
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        params: RequestParams,
        mut headers: Headers,
    ) -> Result<CapturedResponse, TestClientError> {
        let mut url = build_url(&self.base_url, path)?;
        for (name, value) in &headers {
            HeaderName::from_bytes(name.as_bytes())?;
            HeaderValue::from_str(value)?;
        }

        let (body, content_type) = params.apply(&method, &mut url)?;
        if let Some(content_type) = content_type {
            if find_header(&headers, "content-type").is_none() {
                headers.insert("Content-Type".to_owned(), content_type);
            }
        }

        let request = TransportRequest {
            method,
            url,
            headers,
            body,
        };
        let response = self.pipeline.execute(&self.transport, request).await?;
        Ok(response)
    }

    /// Sends a request, then documents it under the upper-cased method and `path`.
    ///
    /// A multipart body that cannot be parsed is logged and left undocumented;
    /// the call itself still succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn process<M>(
        &mut self,
        metadata: &mut M,
        method: Method,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        let documented_method = method.as_str().to_ascii_uppercase();
        let response = self.request(method, path, params, headers).await?;

        match self.document_example(metadata, &documented_method, path) {
            Ok(_) => {}
            Err(TestClientError::MalformedBody(error)) => {
                warn!(method = %documented_method, %path, %error, "request left undocumented");
            }
            Err(error) => return Err(error),
        }

        Ok(response)
    }

    /// Sends a documented `GET` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn get<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::GET, path, params, headers).await
    }

    /// Sends a documented `HEAD` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn head<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::HEAD, path, params, headers).await
    }

    /// Sends a documented `POST` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn post<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::POST, path, params, headers).await
    }

    /// Sends a documented `PUT` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn put<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::PUT, path, params, headers).await
    }

    /// Sends a documented `PATCH` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn patch<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::PATCH, path, params, headers).await
    }

    /// Sends a documented `DELETE` request.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn delete<M>(
        &mut self,
        metadata: &mut M,
        path: &str,
        params: RequestParams,
        headers: Headers,
    ) -> Result<CapturedResponse, TestClientError>
    where
        M: ExampleMetadata,
    {
        self.process(metadata, Method::DELETE, path, params, headers).await
    }
}

impl<T> TestClient<T> {
    /// The base URL every request path is appended to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The raw capture slots.
    pub fn capture(&self) -> &RawExchangeCapture {
        self.pipeline.capture()
    }

    /// The last captured request, if any.
    pub fn last_request(&self) -> Option<&CapturedRequest> {
        self.pipeline.capture().last_request()
    }

    /// The last captured response, `None` before any call or after a transport failure.
    pub fn last_response(&self) -> Option<&CapturedResponse> {
        self.pipeline.capture().last_response()
    }

    /// Headers of the last request.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] before any request.
    pub fn request_headers(&self) -> Result<&Headers, TestClientError> {
        Ok(self.captured_request()?.headers())
    }

    /// Raw query string of the last request, empty when there is none.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] before any request.
    pub fn query_string(&self) -> Result<&str, TestClientError> {
        Ok(self.captured_request()?.query_string().unwrap_or_default())
    }

    /// `Content-Type` of the last request.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] before any request.
    pub fn request_content_type(&self) -> Result<Option<&str>, TestClientError> {
        Ok(self.captured_request()?.content_type())
    }

    /// Headers of the last response.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] when no response was captured.
    pub fn response_headers(&self) -> Result<&Headers, TestClientError> {
        Ok(self.captured_response()?.headers())
    }

    /// Status code of the last response.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] when no response was captured.
    pub fn status(&self) -> Result<StatusCode, TestClientError> {
        Ok(self.captured_response()?.status())
    }

    /// Body of the last response, decoded as UTF-8 with invalid sequences replaced.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] when no response was captured.
    pub fn response_body(&self) -> Result<String, TestClientError> {
        Ok(self.captured_response()?.text())
    }

    /// `Content-Type` of the last response.
    ///
    /// # Errors
    ///
    /// [`TestClientError::NoCapture`] when no response was captured.
    pub fn response_content_type(&self) -> Result<Option<&str>, TestClientError> {
        Ok(self.captured_response()?.content_type())
    }

    /// Appends a [`DocumentationExample`](crate::DocumentationExample) of the
    /// last exchange to `metadata`.
    ///
    /// Returns `false` without touching the captures when the metadata does
    /// not ask for documentation.
    ///
    /// # Errors
    ///
    /// - [`TestClientError::NoCapture`] if no complete exchange was captured.
    /// - [`TestClientError::MalformedBody`] if a multipart body cannot be parsed;
    ///   nothing is appended in that case.
    pub fn document_example<M>(
        &self,
        metadata: &mut M,
        method: &str,
        path: &str,
    ) -> Result<bool, TestClientError>
    where
        M: ExampleMetadata,
    {
        if !metadata.document() {
            info!(%method, %path, "documentation not requested, skipping");
            return Ok(false);
        }

        let request = self.captured_request()?;
        let response = self.captured_response()?;
        let example = self
            .normalizer
            .normalize(method, path, request, response)?;
        metadata.push_request(example);
        debug!(%method, %path, "example documented");

        Ok(true)
    }

    fn captured_request(&self) -> Result<&CapturedRequest, TestClientError> {
        self.last_request().ok_or(TestClientError::NoCapture)
    }

    fn captured_response(&self) -> Result<&CapturedResponse, TestClientError> {
        self.last_response().ok_or(TestClientError::NoCapture)
    }
}

fn build_url(base_url: &Url, path: &str) -> Result<Url, TestClientError> {
    let url = format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let url = url.parse::<Url>()?;
    Ok(url)
}
