use http::Method;
use indexmap::IndexMap;
use tracing::debug;
use url::form_urlencoded;

use super::{BodyRedactor, CurlCommand, DocumentationExample};
use crate::capture::{CapturedRequest, CapturedResponse};
use crate::multipart::{MalformedBodyError, form_data_mime};

/// Builds [`DocumentationExample`]s from a captured request/response pair.
#[derive(Debug, Clone)]
pub struct DocumentationNormalizer {
    redactor: BodyRedactor,
    curl_host: String,
    curl_headers_to_filter: Vec<String>,
}

impl DocumentationNormalizer {
    /// Creates a normalizer rendering `curl` commands against `curl_host`.
    pub fn new(curl_host: impl Into<String>) -> Self {
        Self {
            redactor: BodyRedactor,
            curl_host: curl_host.into(),
            curl_headers_to_filter: vec![],
        }
    }

    /// Headers left out of the generated `curl` command.
    pub fn with_curl_headers_to_filter<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.curl_headers_to_filter = headers.into_iter().map(Into::into).collect();
        self
    }

    /// The host prefix used by `curl` commands.
    pub fn curl_host(&self) -> &str {
        &self.curl_host
    }

    /// Normalizes one exchange.
    ///
    /// `method` and `path` are recorded as given; everything else comes from
    /// the captures.
    ///
    /// # Errors
    ///
    /// Fails with [`MalformedBodyError`] when a `multipart/form-data` request
    /// body cannot be parsed.
    pub fn normalize(
        &self,
        method: &str,
        path: &str,
        request: &CapturedRequest,
        response: &CapturedResponse,
    ) -> Result<DocumentationExample, MalformedBodyError> {
        let raw_body = if has_documented_body(request.method()) {
            request.body()
        } else {
            &[]
        };

        let request_content_type = request.content_type();
        let request_body = if request_content_type.and_then(form_data_mime).is_some() {
            self.redactor.redact(request_content_type, raw_body)?
        } else {
            raw_body.to_vec()
        };

        let request_query_parameters = request
            .query_string()
            .map(parse_query)
            .unwrap_or_default();

        let status = response.status();
        let curl = CurlCommand::new(
            request.method().clone(),
            request.url().path(),
            String::from_utf8_lossy(raw_body),
            request.headers().clone(),
        )
        .with_query(request.query_string().unwrap_or_default())
        .output(&self.curl_host, &self.curl_headers_to_filter);

        debug!(%method, %path, status = status.as_u16(), "documentation example normalized");
        Ok(DocumentationExample {
            request_method: method.to_owned(),
            request_path: path.to_owned(),
            request_body: non_empty_text(&request_body),
            request_headers: request.headers().clone(),
            request_query_parameters,
            request_content_type: request_content_type.map(ToOwned::to_owned),
            response_status: status.as_u16(),
            response_status_text: status.canonical_reason().map(ToOwned::to_owned),
            response_body: non_empty_text(response.body()),
            response_headers: response.headers().clone(),
            response_content_type: response.content_type().map(ToOwned::to_owned),
            curl,
        })
    }
}

fn has_documented_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT
}

/// Flat query parsing; a repeated key keeps its last value.
fn parse_query(query: &str) -> IndexMap<String, String> {
    let mut parameters = IndexMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        parameters.insert(key.into_owned(), value.into_owned());
    }
    parameters
}

fn non_empty_text(body: &[u8]) -> Option<String> {
    (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned())
}
