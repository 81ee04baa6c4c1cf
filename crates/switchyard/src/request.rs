//! Incoming request records and the per-request matching context.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

use crate::cursor::{CursorMark, PathCursor};

static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([^./]+)$").unwrap());

/// The request record supplied by the transport adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub query: HashMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builds a request from a request target such as `/blog/1?draft=true`.
    pub fn from_target(method: impl Into<String>, target: &str) -> Self {
        match target.split_once('?') {
            Some((path, query)) => Request::new(method, path).with_query_string(query),
            None => Request::new(method, target),
        }
    }

    pub fn get(target: &str) -> Self {
        Request::from_target("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Request::from_target("POST", target)
    }

    pub fn put(target: &str) -> Self {
        Request::from_target("PUT", target)
    }

    pub fn delete(target: &str) -> Self {
        Request::from_target("DELETE", target)
    }

    /// Sets the raw query string and re-parses the query mapping from it.
    pub fn with_query_string(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self.query = parse_query_string(Some(&self.query_string));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// Parse a query string into a map, form-decoding names and values (`+` is a
/// space). A key without `=` maps to the empty string; a pair that does not
/// decode to UTF-8 is dropped.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.unwrap_or_default().split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match (form_decode(key), form_decode(value)) {
            (Some(key), Some(value)) => {
                params.insert(key, value);
            }
            _ => debug!("Dropping undecodable query parameter {:?}", pair),
        }
    }
    params
}

fn form_decode(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(Cow::into_owned)
}

/// Per-request state: the immutable request fields, the facts derived from
/// the raw path once up front, and the mutable [`PathCursor`].
///
/// Handlers only ever see `&RequestContext`; the cursor moves solely through
/// the matching primitives.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Request,
    extension: Option<String>,
    is_index: bool,
    cursor: PathCursor,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        let extension = EXTENSION
            .captures(&request.path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let is_index = request.path.is_empty() || request.path == "/";
        let cursor = PathCursor::new(request.path.clone());
        RequestContext {
            request,
            extension,
            is_index,
            cursor,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query.get(name).map(String::as_str)
    }

    pub fn query_string(&self) -> &str {
        &self.request.query_string
    }

    /// Extension of the last path segment (`json` for `/report.json`).
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Whether the whole request path is the root (`""` or `"/"`).
    pub fn is_index(&self) -> bool {
        self.is_index
    }

    pub fn consumed(&self) -> &str {
        self.cursor.consumed()
    }

    pub fn remaining(&self) -> &str {
        self.cursor.remaining()
    }

    pub(crate) fn mark(&self) -> CursorMark {
        self.cursor.mark()
    }

    /// Runs `f` with the cursor moved to `mark`, then puts it back.
    pub(crate) fn at_mark<R>(&mut self, mark: CursorMark, f: impl FnOnce(&Self) -> R) -> R {
        let saved = self.cursor.mark();
        self.cursor.restore(mark);
        let result = f(self);
        self.cursor.restore(saved);
        result
    }

    /// Consumes `len` bytes of the remaining path for the duration of `f`,
    /// then restores the cursor whatever `f` returned.
    pub(crate) fn with_consumed<R>(&mut self, len: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        let mark = self.cursor.mark();
        self.cursor.advance(len);
        let result = f(self);
        self.cursor.restore(mark);
        result
    }
}
