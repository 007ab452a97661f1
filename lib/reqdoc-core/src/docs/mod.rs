//! Documentation records derived from captured exchanges.
//!
//! A [`DocumentationExample`] is built by the [`DocumentationNormalizer`] once
//! both the request and the response of a call have been captured, then
//! appended to the [`ExampleMetadata`] of the running test example.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::transport::Headers;

mod curl;
pub use self::curl::CurlCommand;

mod normalizer;
pub use self::normalizer::DocumentationNormalizer;

mod redaction;
pub use self::redaction::{BodyRedactor, UPLOADED_DATA_PLACEHOLDER};

/// Normalized, redacted description of one HTTP exchange.
///
/// Bodies that are empty are `None`, so a renderer can tell "no body" apart
/// from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationExample {
    /// The method, as given when documenting (e.g. `GET`).
    pub request_method: String,
    /// The path, as given when documenting.
    pub request_path: String,
    /// The documented request body; always `None` for verbs other than `POST`/`PUT`.
    pub request_body: Option<String>,
    /// Request headers as sent.
    pub request_headers: Headers,
    /// Query parameters, the last occurrence of a key wins.
    pub request_query_parameters: IndexMap<String, String>,
    /// The request `Content-Type`.
    pub request_content_type: Option<String>,
    /// The numeric response status.
    pub response_status: u16,
    /// The standard reason phrase, `None` for unknown codes.
    pub response_status_text: Option<String>,
    /// The response body.
    pub response_body: Option<String>,
    /// Response headers as received.
    pub response_headers: Headers,
    /// The response `Content-Type`.
    pub response_content_type: Option<String>,
    /// A `curl` command reproducing the request.
    pub curl: String,
}

/// Per-example metadata owned by the test runner.
///
/// The client reads the documentation flag and appends records; it never
/// replaces or removes existing ones.
pub trait ExampleMetadata {
    /// Whether the current example should be documented.
    fn document(&self) -> bool;

    /// Appends a record to the example's request collection.
    fn push_request(&mut self, example: DocumentationExample);
}

/// In-memory [`ExampleMetadata`], records stored under `requests`.
///
/// ```rust
/// use reqdoc_core::DocumentationMetadata;
///
/// let metadata = DocumentationMetadata::documented();
/// assert!(metadata.document);
/// assert!(metadata.requests.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationMetadata {
    /// The documentation policy flag.
    #[serde(default)]
    pub document: bool,
    /// Documented requests, in call order.
    #[serde(default)]
    pub requests: Vec<DocumentationExample>,
}

impl DocumentationMetadata {
    /// Metadata of an example that wants documentation.
    pub fn documented() -> Self {
        Self {
            document: true,
            requests: vec![],
        }
    }
}

impl ExampleMetadata for DocumentationMetadata {
    fn document(&self) -> bool {
        self.document
    }

    fn push_request(&mut self, example: DocumentationExample) {
        self.requests.push(example);
    }
}
