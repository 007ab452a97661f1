//! `multipart/form-data` support.
//!
//! - [`MultipartForm`] encodes request bodies with text and file parts.
//! - [`parse_form_data`] decodes a raw body into a [`FormNode`] tree, used to
//!   find uploaded file payloads when documenting a request.
//!
//! Field names follow the bracket convention: `user[avatar]` nests the field
//! under a `user` group, `files[]` appends to an indexed group.

use std::convert::Infallible;

use bytes::Bytes;
use futures::stream;
use indexmap::IndexMap;
use mime::Mime;

mod form;
pub use self::form::MultipartForm;

/// Parsed multipart fields, in body order.
pub type FormFields = IndexMap<String, FormNode>;

/// A node of the parsed multipart field tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormNode {
    /// A plain text field.
    Value(String),
    /// An uploaded file.
    File(UploadedFile),
    /// Grouped or array fields, e.g. `user[name]` or `files[]`.
    Group(FormFields),
}

/// A file part of a multipart body.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct UploadedFile {
    /// The client-side file name.
    pub filename: String,
    /// The part `Content-Type`, if any.
    pub content_type: Option<String>,
    /// The file content.
    #[debug("{} bytes", data.len())]
    pub data: Bytes,
}

/// Error raised when a multipart body cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
#[display("Malformed multipart body: {reason}")]
pub struct MalformedBodyError {
    /// What is wrong with the body.
    pub reason: String,
}

impl MalformedBodyError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Returns the parsed MIME type if the content type denotes `multipart/form-data`.
///
/// Content types that cannot be parsed are not considered multipart.
pub fn form_data_mime(content_type: &str) -> Option<Mime> {
    let mime = content_type.parse::<Mime>().ok()?;
    (mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA).then_some(mime)
}

/// Decodes a `multipart/form-data` body.
///
/// The body is already in memory, so the decoder runs to completion on the
/// current thread.
///
/// # Errors
///
/// Fails if the boundary parameter or the opening delimiter is missing, if
/// the body is not valid multipart, or if a part lacks a field name.
pub fn parse_form_data(mime: &Mime, body: &[u8]) -> Result<FormFields, MalformedBodyError> {
    let boundary = mime
        .get_param(mime::BOUNDARY)
        .ok_or_else(|| MalformedBodyError::new("missing boundary parameter"))?
        .as_str()
        .to_owned();
    if !contains(body, format!("--{boundary}").as_bytes()) {
        return Err(MalformedBodyError::new("missing opening boundary"));
    }

    let chunk = Bytes::copy_from_slice(body);
    let stream = stream::once(async move { Ok::<_, Infallible>(chunk) });
    let multipart = multer::Multipart::new(stream, boundary);
    futures::executor::block_on(collect_fields(multipart))
}

async fn collect_fields(
    mut multipart: multer::Multipart<'static>,
) -> Result<FormFields, MalformedBodyError> {
    let mut fields = FormFields::new();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let filename = field.file_name().map(ToOwned::to_owned);
        let name = field
            .name()
            .map(ToOwned::to_owned)
            .or_else(|| filename.clone())
            .ok_or_else(|| MalformedBodyError::new("part without field name"))?;
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.map_err(invalid)?;

        let node = match filename {
            Some(filename) => FormNode::File(UploadedFile {
                filename,
                content_type,
                data,
            }),
            None => FormNode::Value(String::from_utf8_lossy(&data).into_owned()),
        };
        let (head, keys) = split_field_name(&name);
        insert_node(&mut fields, head, &keys, node);
    }
    Ok(fields)
}

fn invalid(error: multer::Error) -> MalformedBodyError {
    MalformedBodyError::new(error.to_string())
}

/// Splits `user[avatar][0]` into `("user", ["avatar", "0"])`.
///
/// Names with unbalanced brackets are kept flat.
fn split_field_name(name: &str) -> (&str, Vec<&str>) {
    let Some(open) = name.find('[') else {
        return (name, vec![]);
    };
    let (head, mut rest) = name.split_at(open);
    let mut keys = vec![];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return (name, vec![]);
        };
        let (key, tail) = inner.split_at(close);
        keys.push(key);
        rest = tail.get(1..).unwrap_or_default();
    }
    if rest.is_empty() && !head.is_empty() {
        (head, keys)
    } else {
        (name, vec![])
    }
}

fn insert_node(fields: &mut FormFields, head: &str, keys: &[&str], node: FormNode) {
    let Some((key, rest)) = keys.split_first() else {
        fields.insert(head.to_owned(), node);
        return;
    };

    let group = fields
        .entry(head.to_owned())
        .or_insert_with(|| FormNode::Group(FormFields::new()));
    if !matches!(group, FormNode::Group(_)) {
        *group = FormNode::Group(FormFields::new());
    }
    if let FormNode::Group(children) = group {
        let key = if key.is_empty() {
            children.len().to_string()
        } else {
            (*key).to_owned()
        };
        insert_node(children, &key, rest, node);
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mime(boundary: &str) -> Mime {
        format!("multipart/form-data; boundary={boundary}")
            .parse()
            .expect("valid mime")
    }

    #[test]
    fn should_detect_form_data_content_type() {
        assert!(form_data_mime("multipart/form-data; boundary=abc").is_some());
        assert!(form_data_mime("Multipart/Form-Data; boundary=abc").is_some());
        assert!(form_data_mime("multipart/mixed; boundary=abc").is_none());
        assert!(form_data_mime("application/x-www-form-urlencoded").is_none());
        assert!(form_data_mime("not a content type").is_none());
    }

    #[test]
    fn should_parse_text_and_file_fields() {
        let body = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n",
            "\r\n",
            "Holiday\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"photo\"; filename=\"beach.png\"\r\n",
            "Content-Type: image/png\r\n",
            "\r\n",
            "\u{89}PNG-bytes\r\n",
            "--XyZ--\r\n",
        );

        let fields = parse_form_data(&mime("XyZ"), body.as_bytes()).expect("should parse");

        insta::assert_debug_snapshot!(fields, @r#"
        {
            "title": Value(
                "Holiday",
            ),
            "photo": File(
                UploadedFile {
                    filename: "beach.png",
                    content_type: Some(
                        "image/png",
                    ),
                    data: 11 bytes,
                },
            ),
        }
        "#);
    }

    #[test]
    fn should_nest_bracketed_field_names() {
        let body = concat!(
            "--b\r\n",
            "Content-Disposition: form-data; name=\"user[name]\"\r\n\r\n",
            "Ada\r\n",
            "--b\r\n",
            "Content-Disposition: form-data; name=\"user[avatar]\"; filename=\"a.png\"\r\n\r\n",
            "AVATAR\r\n",
            "--b\r\n",
            "Content-Disposition: form-data; name=\"files[]\"; filename=\"1.txt\"\r\n\r\n",
            "one\r\n",
            "--b\r\n",
            "Content-Disposition: form-data; name=\"files[]\"; filename=\"2.txt\"\r\n\r\n",
            "two\r\n",
            "--b--\r\n",
        );

        let fields = parse_form_data(&mime("b"), body.as_bytes()).expect("should parse");

        let Some(FormNode::Group(user)) = fields.get("user") else {
            panic!("user should be a group: {fields:?}");
        };
        assert_eq!(user.get("name"), Some(&FormNode::Value("Ada".to_string())));
        assert!(matches!(user.get("avatar"), Some(FormNode::File(_))));

        let Some(FormNode::Group(files)) = fields.get("files") else {
            panic!("files should be a group: {fields:?}");
        };
        let names = files.keys().cloned().collect::<Vec<_>>();
        assert_eq!(names, vec!["0", "1"]);
    }

    #[test]
    fn should_keep_unbalanced_names_flat() {
        let no_keys = Vec::<&str>::new();
        assert_eq!(split_field_name("plain"), ("plain", no_keys.clone()));
        assert_eq!(split_field_name("a[b][c]"), ("a", vec!["b", "c"]));
        assert_eq!(split_field_name("a[]"), ("a", vec![""]));
        assert_eq!(split_field_name("a[b"), ("a[b", no_keys.clone()));
        assert_eq!(split_field_name("[b]"), ("[b]", no_keys));
    }

    #[test]
    fn should_reject_body_without_boundary_parameter() {
        let mime = "multipart/form-data".parse::<Mime>().expect("valid mime");

        let error = parse_form_data(&mime, b"anything").expect_err("should fail");

        insta::assert_snapshot!(error, @"Malformed multipart body: missing boundary parameter");
    }

    #[test]
    fn should_reject_truncated_body() {
        let body = "--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nvalue";

        let error = parse_form_data(&mime("b"), body.as_bytes()).expect_err("should fail");

        assert!(error.reason.to_ascii_lowercase().contains("incomplete"), "{error}");
    }

    #[test]
    fn should_reject_body_without_delimiter() {
        let error = parse_form_data(&mime("b"), b"no delimiter here").expect_err("should fail");

        insta::assert_snapshot!(error, @"Malformed multipart body: missing opening boundary");
    }

    #[test]
    fn should_accept_transport_padding_after_boundary() {
        let body = concat!(
            "--b \t\r\n",
            "Content-Disposition: form-data; name=\"f\"; filename=\"a\"\r\n",
            "\r\n",
            "DATA\r\n",
            "--b--\r\n",
        );

        let fields = parse_form_data(&mime("b"), body.as_bytes()).expect("should parse");

        let Some(FormNode::File(file)) = fields.get("f") else {
            panic!("f should be a file: {fields:?}");
        };
        assert_eq!(file.filename, "a");
        assert_eq!(file.data.as_ref(), b"DATA");
    }

    #[test]
    fn should_reject_part_without_field_name() {
        let body = "--b\r\nContent-Type: text/plain\r\n\r\nvalue\r\n--b--\r\n";

        let error = parse_form_data(&mime("b"), body.as_bytes()).expect_err("should fail");

        insta::assert_snapshot!(error, @"Malformed multipart body: part without field name");
    }
}
