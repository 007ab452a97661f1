use crate::multipart::MalformedBodyError;
use crate::transport::TransportError;

/// Errors that can occur when using the [`TestClient`](crate::TestClient).
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum TestClientError {
    /// The network call failed; surfaced unchanged and never retried.
    Transport(TransportError),

    /// An accessor was used before any exchange was captured.
    ///
    /// Response accessors also report this when the last call failed before
    /// a response could be recorded.
    #[display("no request has been made yet")]
    NoCapture,

    /// The multipart request body could not be parsed while documenting.
    MalformedBody(MalformedBodyError),

    /// URL parsing error when joining the base URL and the request path.
    UrlError(url::ParseError),

    /// Invalid HTTP header name.
    InvalidHeaderName(http::header::InvalidHeaderName),

    /// Invalid HTTP header value.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// Invalid URI built from the client configuration.
    InvalidUri(http::Error),

    /// Form parameters could not be url-encoded.
    #[display("Serialization error: {message}")]
    #[from(skip)]
    SerializationError {
        /// Description of the serialization failure.
        message: String,
    },

    /// The configured base path cannot be used to build URLs.
    #[display("Invalid base path: {error}")]
    #[from(skip)]
    InvalidBasePath {
        /// Description of why the base path is invalid.
        error: String,
    },
}

impl From<serde_urlencoded::ser::Error> for TestClientError {
    fn from(error: serde_urlencoded::ser::Error) -> Self {
        Self::SerializationError {
            message: error.to_string(),
        }
    }
}
