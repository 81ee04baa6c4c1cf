//! Per-request entry point.
//!
//! An [`App`] pairs a frozen [`VariableTypes`] registry with a compiled route
//! tree. Both sit behind `Arc`s, so an `App` is cheap to clone and can be
//! shared across threads; the only per-request mutable state is the
//! [`RequestContext`] built inside [`App::dispatch`].
//!
//! Dispatch outcomes:
//!
//! | evaluation returns        | result                                     |
//! |---------------------------|--------------------------------------------|
//! | `Ok(())`                  | `404 Not found`                            |
//! | `Err(Interrupt::Halt)`    | the halted response                        |
//! | `Err(Interrupt::Client)`  | the error's responder, or `400`            |
//! | `Err(Interrupt::Fatal)`   | `Err(RouteError)`, escapes the request     |
//!
//! A client error's responder runs with the cursor where the error was
//! raised, so it can see how much of the path had matched.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Interrupt, RouteError, Step};
use crate::matcher::VariableTypes;
use crate::request::{Request, RequestContext};
use crate::response::Response;
use crate::routing::{CompiledRoutes, Routes};

/// A routing application ready to dispatch requests.
#[derive(Debug, Clone)]
pub struct App {
    types: Arc<VariableTypes>,
    routes: Arc<CompiledRoutes>,
}

impl App {
    /// Compile `routes` against `types`. Unknown type names, invalid
    /// patterns and bad arities are reported here.
    pub fn new(types: VariableTypes, routes: Routes) -> Result<Self, RouteError> {
        let compiled = CompiledRoutes::compile(&routes, &types)?;
        debug!(
            "Compiled {} top-level route(s) against {} variable type(s)",
            compiled.len(),
            types.names().count()
        );
        Ok(App {
            types: Arc::new(types),
            routes: Arc::new(compiled),
        })
    }

    /// Declare routes with a block, using the default registry.
    ///
    /// ```
    /// use switchyard::{halt, App, Request};
    ///
    /// let app = App::from_fn(|r| {
    ///     r.path("hello").var().get().to(|_, args| halt(format!("hello {}", args.str(0).unwrap_or(""))));
    /// })
    /// .unwrap();
    ///
    /// let response = app.dispatch(Request::get("/hello/world")).unwrap();
    /// assert_eq!(response.body, "hello world");
    /// ```
    pub fn from_fn(block: impl FnOnce(&mut Routes)) -> Result<Self, RouteError> {
        App::new(VariableTypes::new(), Routes::build(block))
    }

    pub fn types(&self) -> &VariableTypes {
        &self.types
    }

    pub fn routes(&self) -> &CompiledRoutes {
        &self.routes
    }

    /// Evaluate the route tree against `ctx` without mapping the outcome.
    pub fn evaluate(&self, ctx: &mut RequestContext) -> Step {
        let mut args = Vec::new();
        self.routes.evaluate(ctx, &mut args)
    }

    /// Route one request to a response.
    ///
    /// Only configuration errors and handler failures come back as `Err`;
    /// unmatched requests and client errors are ordinary responses.
    pub fn dispatch(&self, request: Request) -> Result<Response, RouteError> {
        let mut ctx = RequestContext::new(request);
        debug!(
            "Dispatching {} {} (extension: {:?})",
            ctx.method(),
            ctx.request().path,
            ctx.extension()
        );

        let response = match self.evaluate(&mut ctx) {
            Ok(()) => {
                debug!("No route matched {} {}", ctx.method(), ctx.request().path);
                Response::not_found()
            }
            Err(Interrupt::Halt(response)) => {
                debug!("Halted with status {}", response.status);
                response
            }
            Err(Interrupt::Client(err)) => {
                if err.responder.is_none() {
                    warn!("Client error without responder, answering 400: {}", err);
                } else {
                    debug!("Client error: {}", err);
                }
                match err.raised_at() {
                    Some(mark) => ctx.at_mark(mark, |ctx| err.respond(ctx)),
                    None => err.respond(&ctx),
                }
            }
            Err(Interrupt::Fatal(err)) => {
                warn!(
                    "Dispatch of {} {} failed: {}",
                    ctx.method(),
                    ctx.request().path,
                    err
                );
                return Err(err);
            }
        };
        Ok(response)
    }
}
