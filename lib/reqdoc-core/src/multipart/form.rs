use bytes::{BufMut, Bytes, BytesMut};

/// Builder for `multipart/form-data` request bodies.
///
/// # Example
///
/// ```rust
/// use reqdoc_core::MultipartForm;
///
/// let form = MultipartForm::new()
///     .text("title", "Holiday")
///     .file("photo", "beach.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
///
/// assert!(form.content_type().starts_with("multipart/form-data; boundary="));
/// ```
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

#[derive(Clone, derive_more::Debug)]
struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    #[debug(ignore)]
    data: Bytes,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates an empty form with a generated boundary.
    pub fn new() -> Self {
        let boundary = format!("----formdata-reqdoc-{}", uuid::Uuid::new_v4());
        Self {
            boundary,
            parts: vec![],
        }
    }

    /// Replaces the generated boundary, useful for stable snapshots.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Adds a file upload.
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    /// The boundary separating the parts.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value announcing this form.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Serializes the form body.
    pub fn encode(&self) -> Bytes {
        let boundary = &self.boundary;
        let mut body = BytesMut::new();

        for part in &self.parts {
            body.put_slice(format!("--{boundary}\r\n").as_bytes());
            let name = escape_quoted(&part.name);
            let disposition = match &part.filename {
                Some(filename) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\n",
                    escape_quoted(filename)
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.put_slice(disposition.as_bytes());
            if let Some(content_type) = &part.content_type {
                body.put_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
            }
            body.put_slice(b"\r\n");
            body.put_slice(&part.data);
            body.put_slice(b"\r\n");
        }

        body.put_slice(format!("--{boundary}--\r\n").as_bytes());
        body.freeze()
    }
}

/// Percent-encodes `"`, CR and LF in a quoted parameter, as browsers do.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
