//! Typed value matchers for path variables and query values.
//!
//! A [`Matcher`] recognizes a prefix of a string and turns it into a
//! [`Value`]. It is either a single regex (anchored at the start of the input)
//! or an ordered list of alternative matchers tried first-match-wins.
//!
//! # Failure policy
//!
//! - Without an error handler, a failed match is silent (`Ok(None)`): the
//!   enclosing route declaration is skipped and siblings are still tried.
//! - With an error handler, every failed match is promoted to a
//!   [`ClientError`] that terminates dispatch and is answered by the handler.

mod registry;

pub use registry::{TypeSpec, VariableTypes};

use http::StatusCode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{ClientError, Responder, RouteError};
use crate::request::RequestContext;
use crate::response::{IntoResponse, Response};

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\d+)").unwrap());

/// Converts matched text into a typed value. `None` rejects the text.
pub type Transform = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// A successful match: the text taken from the input and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub text: String,
    pub value: Value,
}

#[derive(Clone)]
enum MatcherKind {
    Pattern(Regex),
    AnyOf(Vec<Arc<Matcher>>),
}

/// A named, optionally transforming value matcher.
#[derive(Clone)]
pub struct Matcher {
    name: Option<String>,
    kind: MatcherKind,
    transform: Option<Transform>,
    on_error: Option<Responder>,
}

impl Matcher {
    /// Compile `pattern` into a matcher anchored at the start of its input.
    pub fn pattern(pattern: &str) -> Result<Self, RouteError> {
        let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|source| {
            RouteError::InvalidPattern {
                name: pattern.to_string(),
                source,
            }
        })?;
        Ok(Matcher::from_kind(MatcherKind::Pattern(regex)))
    }

    /// Alternatives tried in the given order; the first success wins.
    pub fn any_of(alternatives: Vec<Arc<Matcher>>) -> Self {
        Matcher::from_kind(MatcherKind::AnyOf(alternatives))
    }

    /// `\d+`, transformed into an integer.
    pub fn integer() -> Self {
        Matcher::from_kind(MatcherKind::Pattern(DIGITS.clone()))
            .on_transform(|text| text.parse::<i64>().ok().map(Value::from))
    }

    fn from_kind(kind: MatcherKind) -> Self {
        Matcher {
            name: None,
            kind,
            transform: None,
            on_error: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn on_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn on_error<F>(mut self, responder: F) -> Self
    where
        F: Fn(&RequestContext, &ClientError) -> Response + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(responder));
        self
    }

    /// Answer every failed match with `response`.
    pub fn raise_on_error(self, response: impl IntoResponse) -> Self {
        let response = response.into_response();
        self.on_error(move |_, _| response.clone())
    }

    /// Answer every failed match with `400 Bad Request`.
    pub fn halt_on_error(self) -> Self {
        self.raise_on_error(StatusCode::BAD_REQUEST)
    }

    /// Match a prefix of `input`.
    pub fn attempt(&self, input: &str) -> Result<Option<Capture>, ClientError> {
        match self.find(input)? {
            Some(capture) => Ok(Some(capture)),
            None => self.fail(input),
        }
    }

    /// Match the whole of `input`; a prefix match counts as a failure.
    pub fn attempt_whole(&self, input: &str) -> Result<Option<Capture>, ClientError> {
        match self.find(input)? {
            Some(capture) if capture.text.len() == input.len() => Ok(Some(capture)),
            _ => self.fail(input),
        }
    }

    fn find(&self, input: &str) -> Result<Option<Capture>, ClientError> {
        let text = match &self.kind {
            MatcherKind::Pattern(regex) => match regex.find(input) {
                Some(m) => m.as_str(),
                None => return Ok(None),
            },
            MatcherKind::AnyOf(alternatives) => {
                let mut found = None;
                for alternative in alternatives {
                    if let Some(capture) = alternative.attempt(input)? {
                        found = Some(capture);
                        break;
                    }
                }
                match (found, &self.transform) {
                    (Some(capture), None) => return Ok(Some(capture)),
                    (Some(capture), Some(_)) => &input[..capture.text.len()],
                    (None, _) => return Ok(None),
                }
            }
        };
        let value = match &self.transform {
            Some(transform) => match transform(text) {
                Some(value) => value,
                None => return Ok(None),
            },
            None => Value::String(text.to_string()),
        };
        Ok(Some(Capture {
            text: text.to_string(),
            value,
        }))
    }

    fn fail(&self, input: &str) -> Result<Option<Capture>, ClientError> {
        match &self.on_error {
            Some(responder) => Err(ClientError::new(format!(
                "There was an error interpreting the value {:?} for {:?}",
                input,
                self.name.as_deref().unwrap_or("variable")
            ))
            .with_responder(responder.clone())),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Matcher");
        debug.field("name", &self.name);
        match &self.kind {
            MatcherKind::Pattern(regex) => debug.field("pattern", &regex.as_str()),
            MatcherKind::AnyOf(alternatives) => debug.field("any_of", alternatives),
        };
        debug
            .field("transform", &self.transform.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use serde_json::json;

    fn hex() -> Arc<Matcher> {
        Arc::new(
            Matcher::pattern("0x[0-9a-fA-F]+")
                .unwrap()
                .named("hex")
                .on_transform(|text| i64::from_str_radix(&text[2..], 16).ok().map(Value::from)),
        )
    }

    #[test]
    fn test_pattern_is_anchored() {
        let matcher = Matcher::pattern("[a-z]+").unwrap();
        let capture = matcher.attempt("abc/def").unwrap().unwrap();
        assert_eq!(capture.text, "abc");
        assert_eq!(capture.value, json!("abc"));
        assert!(matcher.attempt("1abc").unwrap().is_none());
    }

    #[test]
    fn test_integer_transform() {
        let capture = Matcher::integer().attempt("123/rest").unwrap().unwrap();
        assert_eq!(capture.text, "123");
        assert_eq!(capture.value, json!(123));
    }

    #[test]
    fn test_integer_overflow_is_no_match() {
        let matcher = Matcher::integer();
        assert!(matcher.attempt("99999999999999999999999").unwrap().is_none());
    }

    #[test]
    fn test_composite_first_match_wins() {
        let composite = Matcher::any_of(vec![hex(), Arc::new(Matcher::integer())]);

        let capture = composite.attempt("0x7b").unwrap().unwrap();
        assert_eq!(capture.text, "0x7b");
        assert_eq!(capture.value, json!(123));

        let capture = composite.attempt("123").unwrap().unwrap();
        assert_eq!(capture.value, json!(123));

        assert!(composite.attempt("zzz").unwrap().is_none());
    }

    #[test]
    fn test_composite_transform_applies_to_winning_text() {
        let composite = Matcher::any_of(vec![hex(), Arc::new(Matcher::integer())])
            .on_transform(|text| Some(Value::from(text.len())));
        let capture = composite.attempt("0x7b").unwrap().unwrap();
        assert_eq!(capture.value, json!(4));
    }

    #[test]
    fn test_error_handler_promotes_failure() {
        let matcher = Matcher::pattern("[a-z_]+")
            .unwrap()
            .named("symbol")
            .raise_on_error(500u16);
        let err = matcher.attempt("123").unwrap_err();
        assert!(err.message.contains("symbol"));

        let ctx = RequestContext::new(Request::get("/123"));
        assert_eq!(err.respond(&ctx).status, 500);
    }

    #[test]
    fn test_halt_on_error_answers_bad_request() {
        let matcher = Matcher::integer().named("id").halt_on_error();
        assert!(matcher.attempt("42").unwrap().is_some());

        let err = matcher.attempt("abc").unwrap_err();
        let response = err.respond(&RequestContext::new(Request::get("/abc")));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, "Bad Request");
    }

    #[test]
    fn test_attempt_whole_rejects_prefix() {
        let matcher = Matcher::integer();
        assert!(matcher.attempt_whole("12ab").unwrap().is_none());
        assert_eq!(
            matcher.attempt_whole("12").unwrap().unwrap().value,
            json!(12)
        );
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Matcher::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { .. }));
    }
}
