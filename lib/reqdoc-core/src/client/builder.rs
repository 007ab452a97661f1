use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr};

use http::Uri;
use http::uri::{PathAndQuery, Scheme};
use url::Url;

use super::{TestClient, TestClientError};
use crate::capture::{ExchangeHook, ExchangePipeline};
use crate::docs::DocumentationNormalizer;
use crate::transport::{ReqwestTransport, Transport};

/// Builder for [`TestClient`] instances.
///
/// # Default Configuration
///
/// - **Scheme**: HTTP
/// - **Host**: 127.0.0.1
/// - **Port**: 80
/// - **Base path**: None
/// - **curl host**: the origin of the base URL
/// - **curl headers to filter**: none
///
/// # Example
///
/// ```rust
/// use reqdoc_core::TestClient;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TestClient::builder()
///     .with_host("localhost")
///     .with_port(3000)
///     .with_base_path("/api")?
///     .with_curl_host("https://api.example.com")
///     .with_curl_headers_to_filter(["Host", "Cookie"])
///     .build()?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TestClientBuilder {
    client: reqwest::Client,
    scheme: Scheme,
    host: String,
    port: u16,
    base_path: Option<PathAndQuery>,
    curl_host: Option<String>,
    curl_headers_to_filter: Vec<String>,
    hooks: Vec<Box<dyn ExchangeHook>>,
}

impl TestClientBuilder {
    /// Builds a client backed by [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Fails if the base URL cannot be built from the scheme, host, port and
    /// base path.
    pub fn build(mut self) -> Result<TestClient<ReqwestTransport>, TestClientError> {
        let client = std::mem::take(&mut self.client);
        self.build_with_transport(ReqwestTransport::new(client))
    }

    /// Builds a client sending its requests through `transport`.
    ///
    /// # Errors
    ///
    /// Fails if the base URL cannot be built from the scheme, host, port and
    /// base path.
    pub fn build_with_transport<T>(self, transport: T) -> Result<TestClient<T>, TestClientError>
    where
        T: Transport,
    {
        let Self {
            client: _,
            scheme,
            host,
            port,
            base_path,
            curl_host,
            curl_headers_to_filter,
            hooks,
        } = self;

        let builder = Uri::builder()
            .scheme(scheme)
            .authority(format!("{host}:{port}"));
        let builder = if let Some(path) = &base_path {
            builder.path_and_query(path.path())
        } else {
            builder.path_and_query("/")
        };
        let base_uri = builder.build()?;
        let base_url = base_uri.to_string().parse::<Url>()?;

        let curl_host = curl_host.unwrap_or_else(|| base_url.origin().ascii_serialization());
        let normalizer = DocumentationNormalizer::new(curl_host)
            .with_curl_headers_to_filter(curl_headers_to_filter);

        Ok(TestClient {
            transport,
            base_url,
            pipeline: ExchangePipeline::new(hooks),
            normalizer,
        })
    }

    /// Uses a pre-configured `reqwest` client for [`build`](Self::build).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Sets the HTTP scheme, defaults to `Scheme::HTTP`.
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the hostname, defaults to `127.0.0.1`.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port, defaults to `80`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the base path prepended to every request path.
    ///
    /// # Errors
    ///
    /// Returns [`TestClientError::InvalidBasePath`] if the path contains
    /// invalid characters (such as spaces).
    pub fn with_base_path<P>(mut self, base_path: P) -> Result<Self, TestClientError>
    where
        P: TryInto<PathAndQuery>,
        P::Error: Debug + 'static,
    {
        let base_path = base_path
            .try_into()
            .map_err(|err| TestClientError::InvalidBasePath {
                error: format!("{err:?}"),
            })?;
        self.base_path = Some(base_path);
        Ok(self)
    }

    /// Sets the host shown in generated `curl` commands, e.g. a public API URL.
    pub fn with_curl_host(mut self, curl_host: impl Into<String>) -> Self {
        self.curl_host = Some(curl_host.into());
        self
    }

    /// Sets the headers left out of generated `curl` commands (case-insensitive).
    pub fn with_curl_headers_to_filter<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.curl_headers_to_filter = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Registers a hook notified after the exchange capture, in registration order.
    pub fn with_hook(mut self, hook: impl ExchangeHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }
}

impl Default for TestClientBuilder {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: Scheme::HTTP,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST).to_string(),
            port: 80,
            base_path: None,
            curl_host: None,
            curl_headers_to_filter: vec![],
            hooks: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder_creates_localhost_http_client() {
        let client = TestClientBuilder::default()
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"http://127.0.0.1/");
        assert_eq!(client.normalizer.curl_host(), "http://127.0.0.1");
    }

    #[test]
    fn test_builder_with_custom_scheme_host_and_port() {
        let client = TestClientBuilder::default()
            .with_scheme(Scheme::HTTPS)
            .with_host("api.example.com")
            .with_port(8443)
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"https://api.example.com:8443/");
        assert_eq!(client.normalizer.curl_host(), "https://api.example.com:8443");
    }

    #[test]
    fn test_builder_with_valid_base_path() {
        let client = TestClientBuilder::default()
            .with_port(3000)
            .with_base_path("/api/v1")
            .expect("valid base path")
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"http://127.0.0.1:3000/api/v1");
    }

    #[test]
    fn test_builder_with_invalid_base_path() {
        let result = TestClientBuilder::default().with_base_path("invalid path with spaces");

        assert!(matches!(
            result,
            Err(TestClientError::InvalidBasePath { .. })
        ));
    }

    #[test]
    fn test_builder_with_curl_host() {
        let client = TestClientBuilder::default()
            .with_curl_host("https://docs.example.com")
            .build()
            .expect("should build client");

        assert_eq!(client.normalizer.curl_host(), "https://docs.example.com");
    }

    #[test]
    fn test_builder_with_invalid_host() {
        let result = TestClientBuilder::default().with_host("bad host").build();

        assert!(result.is_err());
    }
}
