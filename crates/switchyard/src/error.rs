//! Error taxonomy and the control-flow channel threaded through matching.
//!
//! Every matching primitive returns a [`Step`]. `Ok(())` means "no match, or
//! the nested block finished without producing a response": the caller simply
//! moves on to its next sibling declaration. An `Err(Interrupt)` short-circuits
//! through every enclosing primitive via `?` until the dispatch loop catches it:
//!
//! - [`Interrupt::Halt`] carries the final response (the success path);
//! - [`Interrupt::Client`] carries a recoverable [`ClientError`] raised by a
//!   matcher with an error handler;
//! - [`Interrupt::Fatal`] carries a [`RouteError`], which escapes dispatch.

use std::fmt;
use std::sync::Arc;

use crate::cursor::CursorMark;
use crate::request::RequestContext;
use crate::response::{IntoResponse, Response};

/// Result type for every matching primitive and handler.
pub type Step = Result<(), Interrupt>;

/// Configuration and programming errors. Never recovered from.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Unknown variable type '{0}'")]
    UnknownVariableType(String),
    #[error("Invalid pattern for '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid variable count: min {min} is greater than max {max}")]
    InvalidArity { min: usize, max: usize },
    #[error("Composite variable type '{0}' has no alternatives")]
    EmptyComposite(String),
    #[error("Unknown status name '{0}'")]
    UnknownStatus(String),
    #[error("Invalid status code {0}")]
    InvalidStatus(u16),
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
    #[error("Handler failed: {0}")]
    Handler(String),
}

/// Produces the response for a [`ClientError`].
pub type Responder = Arc<dyn Fn(&RequestContext, &ClientError) -> Response + Send + Sync>;

/// A recoverable client-side failure, raised when a matcher with an error
/// handler fails to match. Caught once, at the dispatch boundary, where the
/// responder sees the cursor as it was when the error was raised.
#[derive(Clone)]
pub struct ClientError {
    pub message: String,
    pub responder: Option<Responder>,
    raised_at: Option<CursorMark>,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        ClientError {
            message: message.into(),
            responder: None,
            raised_at: None,
        }
    }

    /// Cursor position at the innermost route that saw the error.
    pub fn raised_at(&self) -> Option<CursorMark> {
        self.raised_at
    }

    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Evaluates the responder, or falls back to a plain 400.
    pub fn respond(&self, ctx: &RequestContext) -> Response {
        match &self.responder {
            Some(responder) => responder(ctx, self),
            None => Response::bad_request(),
        }
    }
}

impl fmt::Debug for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientError")
            .field("message", &self.message)
            .field("responder", &self.responder.is_some())
            .field("raised_at", &self.raised_at)
            .finish()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Non-local exits out of the nested match tree.
#[derive(Debug)]
pub enum Interrupt {
    Halt(Response),
    Client(ClientError),
    Fatal(RouteError),
}

impl Interrupt {
    /// Stamps a client error with the current cursor unless an inner route
    /// already did.
    pub(crate) fn raised_in(self, ctx: &RequestContext) -> Self {
        match self {
            Interrupt::Client(mut err) if err.raised_at.is_none() => {
                err.raised_at = Some(ctx.mark());
                Interrupt::Client(err)
            }
            other => other,
        }
    }
}

impl From<RouteError> for Interrupt {
    fn from(err: RouteError) -> Self {
        Interrupt::Fatal(err)
    }
}

impl From<ClientError> for Interrupt {
    fn from(err: ClientError) -> Self {
        Interrupt::Client(err)
    }
}

/// Ends dispatch with `value` from any nesting depth.
///
/// ```
/// use switchyard::{halt, StatusCode, Step};
///
/// fn handler() -> Step {
///     halt(StatusCode::CREATED)
/// }
/// assert!(handler().is_err());
/// ```
pub fn halt(value: impl IntoResponse) -> Step {
    Err(Interrupt::Halt(value.into_response()))
}

/// Ends dispatch with a fatal handler failure.
pub fn fail(message: impl Into<String>) -> Step {
    Err(Interrupt::Fatal(RouteError::Handler(message.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_wraps_response() {
        match halt(404u16) {
            Err(Interrupt::Halt(response)) => assert_eq!(response.status, 404),
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[test]
    fn test_route_error_converts_to_fatal() {
        let interrupt: Interrupt = RouteError::UnknownVariableType("uuid".into()).into();
        assert!(matches!(
            interrupt,
            Interrupt::Fatal(RouteError::UnknownVariableType(ref name)) if name == "uuid"
        ));
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::new("bad value");
        assert_eq!(err.to_string(), "bad value");
        assert!(format!("{err:?}").contains("responder: false"));
        assert!(err.raised_at().is_none());
    }

    #[test]
    fn test_raised_in_keeps_innermost_mark() {
        use crate::request::Request;

        let mut ctx = RequestContext::new(Request::get("/a/b"));
        let inner = ctx.with_consumed(2, |ctx| Interrupt::from(ClientError::new("x")).raised_in(ctx));
        let outer = inner.raised_in(&ctx);
        match outer {
            Interrupt::Client(err) => {
                let mark = err.raised_at().unwrap();
                ctx.at_mark(mark, |ctx| assert_eq!(ctx.remaining(), "/b"));
            }
            other => panic!("expected client error, got {other:?}"),
        }
    }
}
