//! Route declaration, compilation and evaluation.
//!
//! - [`op`]: the declarative operations a route is made of;
//! - [`chain`]: the builder used to declare nested and chained routes;
//! - [`compiled`]: routes resolved against a type registry, ready to
//!   evaluate against a request.

pub mod chain;
pub mod compiled;
pub mod op;

pub use chain::{Args, Chain, Handler, Next, Route, Routes};
pub use compiled::{CompiledOp, CompiledRoutes};
pub use op::{Arity, Op, QueryField, QueryStringMatch, VarType};
