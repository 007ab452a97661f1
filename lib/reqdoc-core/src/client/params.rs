use bytes::Bytes;
use headers::ContentType;
use http::Method;
use indexmap::IndexMap;
use serde::Serialize;
use url::{Url, form_urlencoded};

use super::TestClientError;
use crate::multipart::MultipartForm;

/// Parameters of a request, either merged into the query string or sent as the body.
///
/// Form parameters follow the verb: they are merged into the query string of
/// `GET`, `HEAD` and `DELETE` requests, and url-encoded into the body of any
/// other verb.
///
/// # Example
///
/// ```rust
/// use reqdoc_core::{MultipartForm, RequestParams};
///
/// let search = RequestParams::form_pairs([("color", "red"), ("page", "2")]);
/// let note = RequestParams::text("remember the milk");
/// let upload = RequestParams::from(
///     MultipartForm::new().file("photo", "beach.png", "image/png", vec![1, 2, 3]),
/// );
/// # let _ = (search, note, upload);
/// ```
#[derive(Clone, Default, derive_more::Debug)]
pub enum RequestParams {
    /// No parameters.
    #[default]
    None,

    /// Form parameters, in insertion order.
    Form(IndexMap<String, String>),

    /// A body sent unchanged.
    Raw {
        /// The raw body.
        #[debug("{} bytes", data.len())]
        data: Bytes,
        /// The content type announced unless the caller supplied one.
        content_type: Option<ContentType>,
    },

    /// A `multipart/form-data` body.
    Multipart(MultipartForm),
}

impl RequestParams {
    /// Form parameters from key/value pairs.
    pub fn form_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::Form(pairs)
    }

    /// Form parameters from a serializable struct or map.
    ///
    /// # Errors
    ///
    /// Fails with [`TestClientError::SerializationError`] when the value cannot
    /// be url-encoded, e.g. nested structures.
    pub fn form<T>(value: &T) -> Result<Self, TestClientError>
    where
        T: Serialize + ?Sized,
    {
        let encoded = serde_urlencoded::to_string(value)?;
        let pairs = form_urlencoded::parse(encoded.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        Ok(Self::Form(pairs))
    }

    /// A raw body with its content type.
    pub fn raw(data: impl Into<Bytes>, content_type: ContentType) -> Self {
        Self::Raw {
            data: data.into(),
            content_type: Some(content_type),
        }
    }

    /// A `text/plain` body.
    pub fn text(text: impl Into<String>) -> Self {
        Self::raw(text.into(), ContentType::text())
    }

    /// An `application/json` body.
    ///
    /// # Errors
    ///
    /// Fails with [`TestClientError::SerializationError`] if the value cannot
    /// be serialized.
    pub fn json<T>(value: &T) -> Result<Self, TestClientError>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_vec(value).map_err(|err| TestClientError::SerializationError {
            message: format!("Failed to serialize JSON body: {err}"),
        })?;
        Ok(Self::raw(data, ContentType::json()))
    }

    /// Applies the parameters to a request.
    ///
    /// Returns the body and the content type to announce when the caller did
    /// not supply one.
    pub(super) fn apply(
        self,
        method: &Method,
        url: &mut Url,
    ) -> Result<(Bytes, Option<String>), TestClientError> {
        match self {
            Self::None => Ok((Bytes::new(), None)),
            Self::Form(params) if is_read_verb(method) => {
                merge_query(url, params);
                Ok((Bytes::new(), None))
            }
            Self::Form(params) => {
                let body = serde_urlencoded::to_string(&params)?;
                let content_type = ContentType::form_url_encoded().to_string();
                Ok((Bytes::from(body), Some(content_type)))
            }
            Self::Raw { data, content_type } => {
                Ok((data, content_type.map(|content_type| content_type.to_string())))
            }
            Self::Multipart(form) => Ok((form.encode(), Some(form.content_type()))),
        }
    }
}

impl From<MultipartForm> for RequestParams {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}

fn is_read_verb(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::DELETE
}

/// Merges params into the URL query; params override keys already present.
fn merge_query(url: &mut Url, params: IndexMap<String, String>) {
    if params.is_empty() {
        return;
    }
    let mut query = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect::<IndexMap<_, _>>();
    query.extend(params);

    url.query_pairs_mut().clear().extend_pairs(&query);
}
