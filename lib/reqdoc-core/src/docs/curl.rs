use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::Method;

use crate::transport::Headers;

/// Renders a `curl` command reproducing a captured request.
///
/// Rendering is deterministic: headers are sorted by their formatted name so
/// the same request always produces the same command.
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use reqdoc_core::{CurlCommand, Headers};
///
/// let mut headers = Headers::new();
/// headers.insert("accept".to_string(), "application/json".to_string());
///
/// let curl = CurlCommand::new(Method::GET, "/widgets", "", headers).with_query("color=red");
///
/// assert_eq!(
///     curl.output("http://localhost:3000", &[]),
///     "curl -g \"http://localhost:3000/widgets?color=red\" -X GET \\\n\t-H \"Accept: application/json\""
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CurlCommand {
    method: Method,
    path: String,
    query: Option<String>,
    body: String,
    headers: Headers,
}

impl CurlCommand {
    /// Creates the command for a request.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        body: impl Into<String>,
        headers: Headers,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: body.into(),
            headers,
        }
    }

    /// Sets the query string appended to the URL.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Renders the command against `host`, dropping the headers listed in
    /// `headers_to_filter` (case-insensitive).
    pub fn output(&self, host: &str, headers_to_filter: &[String]) -> String {
        let url = format!("{host}{}", self.path);
        let query = self
            .query
            .as_ref()
            .map(|query| format!("?{query}"))
            .unwrap_or_default();

        let mut parts = match self.method {
            Method::GET => vec![
                "curl".to_string(),
                "-g".to_string(),
                format!("\"{url}{query}\""),
                "-X GET".to_string(),
            ],
            Method::HEAD => vec![
                "curl".to_string(),
                format!("\"{url}{query}\""),
                "-X HEAD".to_string(),
            ],
            _ => {
                let mut parts = vec!["curl".to_string(), format!("\"{url}{query}\"")];
                if !self.body.is_empty() {
                    parts.push(format!("-d '{}'", escape_body(&self.body)));
                }
                parts.push(format!("-X {}", self.method));
                parts
            }
        };
        parts.extend(self.render_headers(headers_to_filter));

        parts.join(" ")
    }

    fn render_headers(&self, headers_to_filter: &[String]) -> Vec<String> {
        let mut headers = self
            .headers
            .iter()
            .map(|(name, value)| (format_header_name(name), value))
            .filter(|(name, _)| {
                !headers_to_filter
                    .iter()
                    .any(|filtered| filtered.eq_ignore_ascii_case(name))
            })
            .collect::<Vec<_>>();
        headers.sort_by(|(left, _), (right, _)| left.cmp(right));

        headers
            .into_iter()
            .map(|(name, value)| {
                if let Some(credentials) = basic_credentials(&name, value) {
                    format!("\\\n\t-u {credentials}")
                } else {
                    format!("\\\n\t-H \"{name}: {}\"", value.replace('"', "\\\""))
                }
            })
            .collect()
    }
}

/// Header names whose usual spelling is not plain train case.
const WELL_KNOWN_HEADER_NAMES: [&str; 8] = [
    "Content-MD5",
    "DNT",
    "ETag",
    "TE",
    "WWW-Authenticate",
    "X-DNS-Prefetch-Control",
    "X-UA-Compatible",
    "X-XSS-Protection",
];

/// Formats a header name in train case: `x-api-key` becomes `X-Api-Key`,
/// `etag` becomes `ETag`.
fn format_header_name(name: &str) -> String {
    use cruet::*;
    WELL_KNOWN_HEADER_NAMES
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
        .map_or_else(|| name.to_train_case(), |known| (*known).to_string())
}

fn escape_body(body: &str) -> String {
    body.replace('\'', "\\u0027")
}

/// Decodes `Authorization: Basic <base64>` into `user:password`.
fn basic_credentials(name: &str, value: &str) -> Option<String> {
    if !name.eq_ignore_ascii_case("authorization") {
        return None;
    }
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(decoded).ok()
}
