//! Switchyard: nested, backtracking request routing.
//!
//! Routes are declared as a tree of matching operations. Each operation
//! consumes a prefix of the request path (or checks the method, extension or
//! query) and hands control to its nested block; whatever a nested block
//! consumed is put back once it returns, so sibling declarations always see
//! the path as their parent left it. A handler ends dispatch by calling
//! [`halt`] from any depth.
//!
//! ```
//! use switchyard::{halt, App, Request, Routes, StatusCode, VariableTypes};
//!
//! let mut types = VariableTypes::new();
//! types.register("slug", "[a-z0-9-]+").unwrap();
//!
//! let routes = Routes::build(|r| {
//!     r.path("blog").nest(|blog| {
//!         blog.get().respond("index");
//!         blog.var_as("integer").get().to(|_, args| halt(format!("post {}", args[0])));
//!         blog.var_as("slug").extension("json").to(|_, args| {
//!             halt(format!("{{\"slug\": \"{}\"}}", args.str(0).unwrap_or_default()))
//!         });
//!         blog.post().respond(StatusCode::CREATED);
//!     });
//! });
//!
//! let app = App::new(types, routes).unwrap();
//! assert_eq!(app.dispatch(Request::get("/blog/42")).unwrap().body, "post 42");
//! assert_eq!(app.dispatch(Request::get("/blog/hello.json")).unwrap().body, "{\"slug\": \"hello\"}");
//! assert_eq!(app.dispatch(Request::post("/blog")).unwrap().status, 201);
//! assert_eq!(app.dispatch(Request::delete("/blog")).unwrap().status, 404);
//! ```

// ===== Engine =====
pub mod app;
pub mod cursor;
pub mod error;
pub mod matcher;
pub mod request;
pub mod response;
pub mod routing;

// ===== Configuration =====
pub mod config;

pub use app::App;
pub use config::{ConfigError, RouteFile, Settings};
pub use cursor::{CursorMark, PathCursor};
pub use error::{fail, halt, ClientError, Interrupt, RouteError, Step};
pub use matcher::{Capture, Matcher, TypeSpec, VariableTypes};
pub use request::{Request, RequestContext};
pub use http::StatusCode;
pub use response::{status_named, IntoResponse, Response};
pub use routing::{Args, Arity, Chain, Op, QueryField, QueryStringMatch, Routes, VarType};
