//! # Reqdoc Core
//!
//! Generate API documentation examples as a byproduct of your HTTP tests.
//!
//! A [`TestClient`] sends each request through a [`Transport`] with the
//! exchange capture attached. Once the response is in, the last exchange can
//! be turned into a [`DocumentationExample`]: method, path, headers, query
//! parameters, bodies, status, and a `curl` command reproducing the call.
//! Uploaded files of `multipart/form-data` bodies are replaced by
//! [`UPLOADED_DATA_PLACEHOLDER`] in the documented body.
//!
//! Whether an example is documented is decided by the test runner through
//! [`ExampleMetadata::document`]; rendering the collected records is left to
//! the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reqdoc_core::{DocumentationMetadata, Headers, MultipartForm, TestClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = TestClient::builder()
//!     .with_host("localhost")
//!     .with_port(3000)
//!     .with_curl_headers_to_filter(["Host"])
//!     .build()?;
//! let mut metadata = DocumentationMetadata::documented();
//!
//! let form = MultipartForm::new()
//!     .text("title", "Holiday")
//!     .file("photo", "beach.png", "image/png", std::fs::read("beach.png")?);
//! client
//!     .post(&mut metadata, "/photos", form.into(), Headers::new())
//!     .await?;
//!
//! assert_eq!(client.status()?.as_u16(), 201);
//! let example = &metadata.requests[0];
//! println!("{}", example.curl);
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom transport
//!
//! [`ReqwestTransport`] is used by default; any [`Transport`] can be plugged
//! in with [`TestClientBuilder::build_with_transport`], e.g. to call an
//! in-process service.

mod capture;
pub use self::capture::{CapturedRequest, CapturedResponse, ExchangeHook, RawExchangeCapture};

mod client;
pub use self::client::{RequestParams, TestClient, TestClientBuilder, TestClientError};

mod docs;
pub use self::docs::{
    BodyRedactor, CurlCommand, DocumentationExample, DocumentationMetadata,
    DocumentationNormalizer, ExampleMetadata, UPLOADED_DATA_PLACEHOLDER,
};

mod multipart;
pub use self::multipart::{
    FormFields, FormNode, MalformedBodyError, MultipartForm, UploadedFile, form_data_mime,
    parse_form_data,
};

mod transport;
pub use self::transport::{
    Headers, ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
    find_header,
};
