//! Route declaration and block-less chaining.
//!
//! Every operation can be written either with an explicit nested block:
//!
//! ```
//! # use switchyard::{halt, Routes};
//! let mut routes = Routes::new();
//! routes.path("blog").nest(|blog| {
//!     blog.var_as("integer").nest(|post| {
//!         post.get().to(|_, args| halt(format!("post {}", args[0])));
//!     });
//! });
//! ```
//!
//! or as a chain where only the last call supplies the handler:
//!
//! ```
//! # use switchyard::{halt, Routes};
//! let mut routes = Routes::new();
//! routes.path("blog").var_as("integer").get().to(|_, args| halt(format!("post {}", args[0])));
//! ```
//!
//! A [`Chain`] queues its operations. Attaching a terminal block (`to`,
//! `respond`, `nest`) consumes the chain and replays the queue as a nested
//! route: the first queued op encloses the second, and so on, with the
//! terminal block innermost. Values captured along the way are accumulated in
//! order and handed to the handler. A chain dropped without a terminal block
//! registers nothing.

use serde_json::Value;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use super::op::{Arity, Op, QueryField, QueryStringMatch, VarType};
use crate::error::{halt, Step};
use crate::request::RequestContext;
use crate::response::IntoResponse;

/// Terminal handler: receives the request and every value captured on the
/// way down, in order.
pub type Handler = Arc<dyn Fn(&RequestContext, Args<'_>) -> Step + Send + Sync>;

/// Values captured by the enclosing operations.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Args { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    pub fn str(&self, index: usize) -> Option<&'a str> {
        self.get(index).and_then(Value::as_str)
    }

    pub fn int(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    pub fn as_slice(&self) -> &'a [Value] {
        self.values
    }
}

impl Index<usize> for Args<'_> {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

/// What runs once a route's operation matched.
#[derive(Clone)]
pub enum Next {
    Handler(Handler),
    Routes(Routes),
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Handler(_) => f.write_str("Handler"),
            Next::Routes(routes) => f.debug_tuple("Routes").field(routes).finish(),
        }
    }
}

/// A single declaration: an operation and what it leads to.
#[derive(Debug, Clone)]
pub struct Route {
    pub op: Op,
    pub next: Next,
}

/// An ordered list of sibling route declarations.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Routes::default()
    }

    /// Build a route list with a declaration block.
    pub fn build(block: impl FnOnce(&mut Routes)) -> Self {
        let mut routes = Routes::new();
        block(&mut routes);
        routes
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Start a chain with an arbitrary operation.
    pub fn on(&mut self, op: Op) -> Chain<'_> {
        Chain {
            routes: self,
            calls: vec![op],
        }
    }
}

impl Extend<Route> for Routes {
    fn extend<I: IntoIterator<Item = Route>>(&mut self, iter: I) {
        self.routes.extend(iter);
    }
}

impl IntoIterator for Routes {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.into_iter()
    }
}

/// Queued operations waiting for a terminal block.
///
/// Terminal methods take the chain by value, so nothing can be appended once
/// replay has started.
#[must_use = "a route chain registers nothing until a handler or nested block is attached"]
pub struct Chain<'a> {
    routes: &'a mut Routes,
    calls: Vec<Op>,
}

impl<'a> Chain<'a> {
    /// Append an arbitrary operation.
    pub fn then(mut self, op: Op) -> Self {
        self.calls.push(op);
        self
    }

    /// Attach the terminal handler.
    pub fn to<F>(self, handler: F)
    where
        F: Fn(&RequestContext, Args<'_>) -> Step + Send + Sync + 'static,
    {
        self.finish(Next::Handler(Arc::new(handler)));
    }

    /// Attach a handler that always halts with `value`.
    pub fn respond(self, value: impl IntoResponse) {
        let response = value.into_response();
        self.to(move |_, _| halt(response.clone()));
    }

    /// Attach a nested block of sibling declarations.
    pub fn nest(self, block: impl FnOnce(&mut Routes)) {
        self.finish(Next::Routes(Routes::build(block)));
    }

    fn finish(mut self, terminal: Next) {
        let mut calls = std::mem::take(&mut self.calls);
        let mut next = terminal;
        while let Some(op) = calls.pop() {
            let route = Route { op, next };
            if calls.is_empty() {
                self.routes.push(route);
                return;
            }
            next = Next::Routes(Routes {
                routes: vec![route],
            });
        }
    }
}

impl Drop for Chain<'_> {
    fn drop(&mut self) {
        if !self.calls.is_empty() {
            let kinds: Vec<&str> = self.calls.iter().map(Op::kind).collect();
            tracing::debug!(
                "Route chain {:?} dropped without a handler; it will never match",
                kinds
            );
        }
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").field("calls", &self.calls).finish()
    }
}

// Generates every operation twice: on `Routes`, where it starts a chain, and
// on `Chain`, where it appends to the queue.
macro_rules! route_ops {
    ($($(#[$meta:meta])* fn $name:ident($($arg:ident: $ty:ty),*) => $op:expr;)*) => {
        impl Routes {
            $(
                $(#[$meta])*
                pub fn $name(&mut self, $($arg: $ty),*) -> Chain<'_> {
                    self.on($op)
                }
            )*
        }

        impl<'a> Chain<'a> {
            $(
                $(#[$meta])*
                pub fn $name(self, $($arg: $ty),*) -> Self {
                    self.then($op)
                }
            )*
        }
    };
}

route_ops! {
    /// Match literal segment(s): `path("foo")` matches `/foo`, `/foo/` and
    /// `/foo/bar`, never `/foobar`.
    fn path(p: impl Into<String>) => Op::Path(p.into());
    /// Match a literal prefix with no trailing boundary.
    fn exact_path(p: impl Into<String>) => Op::ExactPath(p.into());
    /// Match literal segment(s) and require the whole path to be consumed.
    fn whole_path(p: impl Into<String>) => Op::WholePath(p.into());
    /// Match a literal with an optional leading slash.
    fn part(p: impl Into<String>) => Op::Part(p.into());
    /// Match a regex with an optional leading slash.
    fn part_pattern(pattern: impl Into<String>) => Op::PartPattern(pattern.into());
    /// Capture one path segment.
    fn var() => Op::var(VarType::Segment, Arity::One);
    /// Capture one value of the given type.
    fn var_as(ty: impl Into<VarType>) => Op::var(ty.into(), Arity::One);
    /// Capture `count` segments.
    fn multi_var(count: impl Into<Arity>) => Op::var(VarType::Segment, count.into());
    /// Capture `count` values of the given type.
    fn multi_var_as(count: impl Into<Arity>, ty: impl Into<VarType>) => Op::var(ty.into(), count.into());
    /// Capture segments for as long as they match.
    fn glob() => Op::var(VarType::Segment, Arity::Repeating);
    /// Capture values of the given type for as long as they match.
    fn glob_as(ty: impl Into<VarType>) => Op::var(ty.into(), Arity::Repeating);
    /// Capture one value without requiring a leading slash.
    fn partial_var() => Op::partial_var(VarType::Segment);
    fn partial_var_as(ty: impl Into<VarType>) => Op::partial_var(ty.into());
    /// Match when the request's extension is `ext`, consuming `.ext`.
    fn extension(ext: impl Into<String>) => Op::Extension(ext.into());
    fn no_extension() => Op::NoExtension;
    /// Capture everything left.
    fn remainder() => Op::Remainder;
    /// Require that nothing is left.
    fn complete() => Op::Complete;
    fn get() => Op::method("GET", None);
    fn post() => Op::method("POST", None);
    fn put() => Op::method("PUT", None);
    fn patch() => Op::method("PATCH", None);
    fn delete() => Op::method("DELETE", None);
    fn head() => Op::method("HEAD", None);
    fn options() => Op::method("OPTIONS", None);
    /// Gate on `verb` and require that nothing is left.
    fn request_method(verb: impl Into<String>) => Op::method(verb, None);
    /// Gate on `verb` and require the rest of the path to be exactly `p`.
    fn request_method_at(verb: impl Into<String>, p: impl Into<String>) => Op::method(verb, Some(p.into()));
    /// Require query parameters, passing their values on positionally.
    fn query(names: impl IntoIterator<Item = impl Into<String>>) => Op::Query(names.into_iter().map(Into::into).collect());
    /// Check query parameters per key, passing them on as one object.
    fn query_fields(fields: impl IntoIterator<Item = (impl Into<String>, impl Into<QueryField>)>) =>
        Op::QueryFields(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
    fn query_string(qs: impl Into<QueryStringMatch>) => Op::QueryString(qs.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape(routes: &Routes) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(routes: &Routes, depth: usize, out: &mut Vec<String>) {
            for route in routes.routes() {
                out.push(format!("{}{}", "  ".repeat(depth), route.op.kind()));
                if let Next::Routes(inner) = &route.next {
                    walk(inner, depth + 1, out);
                }
            }
        }
        walk(routes, 0, &mut out);
        out
    }

    #[test]
    fn test_chain_replays_as_nested_routes() {
        let routes = Routes::build(|r| {
            r.path("a").var().get().to(|_, _| Ok(()));
        });
        assert_eq!(shape(&routes), vec!["path", "  var", "    method"]);
        assert!(matches!(
            routes.routes()[0].next,
            Next::Routes(ref inner) if matches!(inner.routes()[0].next, Next::Routes(_))
        ));
    }

    #[test]
    fn test_single_call_chain_is_direct() {
        let routes = Routes::build(|r| {
            r.get().respond(200u16);
        });
        assert_eq!(routes.len(), 1);
        assert!(matches!(routes.routes()[0].next, Next::Handler(_)));
    }

    #[test]
    fn test_nest_keeps_siblings_in_order() {
        let routes = Routes::build(|r| {
            r.path("blog").nest(|blog| {
                blog.get().respond("index");
                blog.post().respond(201u16);
            });
            r.path("about").respond("about");
        });
        assert_eq!(
            shape(&routes),
            vec!["path", "  method", "  method", "path"]
        );
    }

    #[test]
    fn test_dropped_chain_registers_nothing() {
        let mut routes = Routes::new();
        let _ = routes.path("a").var();
        assert!(routes.is_empty());
    }

    #[test]
    fn test_args_accessors() {
        let values = vec![json!("hey"), json!(5)];
        let args = Args::new(&values);
        assert_eq!(args.len(), 2);
        assert_eq!(args.str(0), Some("hey"));
        assert_eq!(args.int(1), Some(5));
        assert_eq!(args[1], json!(5));
        assert!(args.get(2).is_none());
    }
}
