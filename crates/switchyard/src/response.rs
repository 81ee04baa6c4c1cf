//! Terminal responses and the values `halt` accepts.
//!
//! A [`Response`] is the `{status, headers, body}` triple handed back to the
//! transport adapter. Anything implementing [`IntoResponse`] can be passed to
//! [`halt`](crate::halt): a full response, a [`StatusCode`], a bare status
//! code, a body string, or the usual tuple shapes.

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use once_cell::sync::Lazy;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::error::RouteError;

/// Body used when no route produced a response.
pub const NOT_FOUND_BODY: &str = "Not found";

/// Body used when a client error has no responder of its own.
pub const CLIENT_ERROR_BODY: &str = "There was an error with your request";

/// Every registered status keyed by its snake_case reason phrase
/// (`not_found`, `unprocessable_entity`, `i_m_a_teapot`).
static STATUS_NAMES: Lazy<HashMap<String, StatusCode>> = Lazy::new(|| {
    (100..600u16)
        .filter_map(|code| StatusCode::from_u16(code).ok())
        .filter_map(|status| Some((snake_case(status.canonical_reason()?), status)))
        .collect()
});

fn snake_case(reason: &str) -> String {
    reason
        .chars()
        .map(|c| match c {
            ' ' | '-' | '\'' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Look up a status by the snake_case form of its reason phrase.
pub fn status_named(name: &str) -> Result<StatusCode, RouteError> {
    STATUS_NAMES
        .get(name)
        .copied()
        .ok_or_else(|| RouteError::UnknownStatus(name.to_string()))
}

/// A status from a bare code. Codes outside `100..=999` become a 500.
fn status_from_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or_else(|_| {
        warn!("Invalid status code {}, answering 500", code);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// A terminal response produced by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets one header, replacing any value under the same name. Invalid
    /// names or values are skipped.
    pub fn with_header(self, name: &str, value: &str) -> Self {
        self.merge_headers([(name, value)])
    }

    pub fn merge_headers<H, K, V>(mut self, headers: H) -> Self
    where
        H: IntoIterator<Item = (K, V)>,
        HeaderName: TryFrom<K>,
        HeaderValue: TryFrom<V>,
    {
        for (key, value) in headers {
            match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    self.headers.insert(name, value);
                }
                _ => warn!("Skipping invalid header on {} response", self.status),
            }
        }
        self
    }

    /// 302 redirect to `location`.
    pub fn redirect(location: &str) -> Self {
        Response::new(StatusCode::FOUND).with_header("location", location)
    }

    /// 301 redirect to `location`.
    pub fn redirect_permanent(location: &str) -> Self {
        Response::new(StatusCode::MOVED_PERMANENTLY).with_header("location", location)
    }

    pub fn not_found() -> Self {
        Response::new(StatusCode::NOT_FOUND).with_body(NOT_FOUND_BODY)
    }

    pub fn bad_request() -> Self {
        Response::new(StatusCode::BAD_REQUEST).with_body(CLIENT_ERROR_BODY)
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let headers: BTreeMap<&str, Cow<'_, str>> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes())))
            .collect();
        let mut state = serializer.serialize_struct("Response", 3)?;
        state.serialize_field("status", &self.status.as_u16())?;
        state.serialize_field("headers", &headers)?;
        state.serialize_field("body", &self.body)?;
        state.end()
    }
}

/// Conversion into a terminal [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

/// A named status halts with its reason phrase as the body.
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        Response::new(self).with_body(self.canonical_reason().unwrap_or_default())
    }
}

/// A bare status halts with an empty body.
impl IntoResponse for u16 {
    fn into_response(self) -> Response {
        Response::new(status_from_code(self))
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        Response::new(StatusCode::OK).with_body(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::new(StatusCode::OK).with_body(self)
    }
}

impl<B: Into<String>> IntoResponse for (StatusCode, B) {
    fn into_response(self) -> Response {
        Response::new(self.0).with_body(self.1)
    }
}

impl<B: Into<String>> IntoResponse for (u16, B) {
    fn into_response(self) -> Response {
        Response::new(status_from_code(self.0)).with_body(self.1)
    }
}

impl IntoResponse for (&str, u16) {
    fn into_response(self) -> Response {
        Response::new(status_from_code(self.1)).with_body(self.0)
    }
}

impl IntoResponse for (String, u16) {
    fn into_response(self) -> Response {
        Response::new(status_from_code(self.1)).with_body(self.0)
    }
}

impl<H, K, V, B> IntoResponse for (u16, H, B)
where
    H: IntoIterator<Item = (K, V)>,
    HeaderName: TryFrom<K>,
    HeaderValue: TryFrom<V>,
    B: Into<String>,
{
    fn into_response(self) -> Response {
        Response::new(status_from_code(self.0))
            .merge_headers(self.1)
            .with_body(self.2)
    }
}
