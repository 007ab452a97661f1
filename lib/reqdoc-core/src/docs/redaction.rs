use tracing::debug;

use crate::multipart::{FormFields, FormNode, MalformedBodyError, form_data_mime, parse_form_data};

/// Placeholder replacing uploaded file content in documented bodies.
pub const UPLOADED_DATA_PLACEHOLDER: &str = "[uploaded data]";

/// Replaces uploaded file payloads of multipart bodies with [`UPLOADED_DATA_PLACEHOLDER`].
///
/// Every other byte of the body is left untouched, so boundaries, part headers
/// and text fields still show in the documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyRedactor;

impl BodyRedactor {
    /// Redacts a raw request body according to its content type.
    ///
    /// Bodies that are not `multipart/form-data`, including those with an
    /// unparsable content type, are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedBodyError`] if the multipart body cannot be parsed.
    pub fn redact(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<Vec<u8>, MalformedBodyError> {
        let Some(mime) = content_type.and_then(form_data_mime) else {
            return Ok(body.to_vec());
        };

        let fields = parse_form_data(&mime, body)?;
        let redacted = self.redact_fields(&fields, body.to_vec());
        debug!(
            before = body.len(),
            after = redacted.len(),
            "multipart body redacted"
        );
        Ok(redacted)
    }

    /// Replaces the content of every file found in `fields` within `body`.
    pub fn redact_fields(&self, fields: &FormFields, body: Vec<u8>) -> Vec<u8> {
        fields.values().fold(body, |body, node| match node {
            FormNode::File(file) => {
                replace_all(&body, &file.data, UPLOADED_DATA_PLACEHOLDER.as_bytes())
            }
            FormNode::Group(group) => self.redact_fields(group, body),
            FormNode::Value(_) => body,
        })
    }
}

/// Exact byte-sequence substitution; an empty needle leaves the haystack as is.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return haystack.to_vec();
    }

    let mut result = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(index) = rest
        .windows(needle.len())
        .position(|window| window == needle)
    {
        let (before, after) = rest.split_at(index);
        result.extend_from_slice(before);
        result.extend_from_slice(replacement);
        rest = after.get(needle.len()..).unwrap_or_default();
    }
    result.extend_from_slice(rest);
    result
}
