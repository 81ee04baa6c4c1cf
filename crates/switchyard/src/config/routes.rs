//! Declarative route tables.
//!
//! ```yaml
//! routes:
//!   - path: blog
//!     routes:
//!       - var: integer
//!         then: [{ get: ~ }]
//!         respond: { status: 200, body: "post {0}" }
//!       - post: ~
//!         respond: created
//! ```
//!
//! Every entry holds exactly one operation key, optionally followed by more
//! operations under `then` (chained, as with block-less chaining in code),
//! and ends in either nested `routes` or a terminal `respond`.

use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::{read_file, ConfigError};
use crate::error::{halt, RouteError};
use crate::response::{status_named, IntoResponse, Response};
use crate::routing::{Arity, Args, Chain, Op, QueryField, QueryStringMatch, Routes, VarType};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\d+)\}").unwrap());

/// A whole route table file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteFile {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl RouteFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = read_file(path.as_ref())?;
        RouteFile::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: RouteFile = serde_yaml::from_str(contents)?;
        Ok(file)
    }

    /// Declare every entry onto a fresh [`Routes`].
    pub fn to_routes(&self) -> Result<Routes, ConfigError> {
        declare_all(&self.routes)
    }
}

fn declare_all(entries: &[RouteEntry]) -> Result<Routes, ConfigError> {
    let mut routes = Routes::new();
    for entry in entries {
        entry.declare(&mut routes)?;
    }
    Ok(routes)
}

fn chain_ops(routes: &mut Routes, first: Op, rest: Vec<Op>) -> Chain<'_> {
    rest.into_iter().fold(routes.on(first), Chain::then)
}

/// One route declaration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteEntry {
    #[serde(flatten)]
    pub op: OpEntry,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<ChainedOp>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respond: Option<ResponseEntry>,
}

impl RouteEntry {
    fn declare(&self, routes: &mut Routes) -> Result<(), ConfigError> {
        let first = self.op.to_op()?;
        let rest = self
            .then
            .iter()
            .map(|chained| chained.op.to_op())
            .collect::<Result<Vec<_>, _>>()?;
        match (&self.respond, self.routes.is_empty()) {
            (Some(entry), true) => {
                let response = entry.to_response()?;
                chain_ops(routes, first, rest).to(move |_, args| halt(render(&response, args)));
            }
            (None, false) => {
                let nested = declare_all(&self.routes)?;
                chain_ops(routes, first, rest).nest(move |r| r.extend(nested));
            }
            (Some(_), false) => return Err(self.invalid("has both 'routes' and 'respond'")),
            (None, true) => return Err(self.invalid("needs either 'routes' or 'respond'")),
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::InvalidRoute {
            op: self.op.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// One element of a `then` list: a single-key map such as `{ get: ~ }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainedOp {
    #[serde(flatten)]
    pub op: OpEntry,
}

/// A single route operation, keyed by its name.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpEntry {
    Path(String),
    ExactPath(String),
    WholePath(String),
    Part(String),
    PartPattern(String),
    /// Optional type name; a plain segment when absent.
    Var(Option<String>),
    PartialVar(Option<String>),
    Glob(Option<String>),
    MultiVar {
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        min: Option<usize>,
        #[serde(default)]
        max: Option<usize>,
        #[serde(default, rename = "type")]
        ty: Option<String>,
    },
    Extension(String),
    NoExtension,
    Remainder,
    Complete,
    /// Optional whole-path literal, as for the other method keys.
    Get(Option<String>),
    Post(Option<String>),
    Put(Option<String>),
    Patch(Option<String>),
    Delete(Option<String>),
    Head(Option<String>),
    Options(Option<String>),
    Method {
        verb: String,
        #[serde(default)]
        path: Option<String>,
    },
    Query(QueryEntry),
    QueryString(QueryStringEntry),
}

impl OpEntry {
    pub fn name(&self) -> &'static str {
        match self {
            OpEntry::Path(_) => "path",
            OpEntry::ExactPath(_) => "exact_path",
            OpEntry::WholePath(_) => "whole_path",
            OpEntry::Part(_) => "part",
            OpEntry::PartPattern(_) => "part_pattern",
            OpEntry::Var(_) => "var",
            OpEntry::PartialVar(_) => "partial_var",
            OpEntry::Glob(_) => "glob",
            OpEntry::MultiVar { .. } => "multi_var",
            OpEntry::Extension(_) => "extension",
            OpEntry::NoExtension => "no_extension",
            OpEntry::Remainder => "remainder",
            OpEntry::Complete => "complete",
            OpEntry::Get(_) => "get",
            OpEntry::Post(_) => "post",
            OpEntry::Put(_) => "put",
            OpEntry::Patch(_) => "patch",
            OpEntry::Delete(_) => "delete",
            OpEntry::Head(_) => "head",
            OpEntry::Options(_) => "options",
            OpEntry::Method { .. } => "method",
            OpEntry::Query(_) => "query",
            OpEntry::QueryString(_) => "query_string",
        }
    }

    pub fn to_op(&self) -> Result<Op, ConfigError> {
        let var_type = |ty: &Option<String>| match ty {
            Some(name) => VarType::Named(name.clone()),
            None => VarType::Segment,
        };
        Ok(match self {
            OpEntry::Path(p) => Op::Path(p.clone()),
            OpEntry::ExactPath(p) => Op::ExactPath(p.clone()),
            OpEntry::WholePath(p) => Op::WholePath(p.clone()),
            OpEntry::Part(p) => Op::Part(p.clone()),
            OpEntry::PartPattern(p) => Op::PartPattern(p.clone()),
            OpEntry::Var(ty) => Op::var(var_type(ty), Arity::One),
            OpEntry::PartialVar(ty) => Op::partial_var(var_type(ty)),
            OpEntry::Glob(ty) => Op::var(var_type(ty), Arity::Repeating),
            OpEntry::MultiVar {
                count,
                min,
                max,
                ty,
            } => {
                let arity = match (count, min, max) {
                    (Some(n), None, None) => Arity::from(*n),
                    (None, Some(min), Some(max)) => Arity::Between(*min, *max),
                    _ => {
                        return Err(ConfigError::InvalidRoute {
                            op: self.name().to_string(),
                            reason: "expected either 'count' or both 'min' and 'max'".to_string(),
                        })
                    }
                };
                Op::var(var_type(ty), arity)
            }
            OpEntry::Extension(ext) => Op::Extension(ext.clone()),
            OpEntry::NoExtension => Op::NoExtension,
            OpEntry::Remainder => Op::Remainder,
            OpEntry::Complete => Op::Complete,
            OpEntry::Get(p)
            | OpEntry::Post(p)
            | OpEntry::Put(p)
            | OpEntry::Patch(p)
            | OpEntry::Delete(p)
            | OpEntry::Head(p)
            | OpEntry::Options(p) => Op::method(self.name(), p.clone()),
            OpEntry::Method { verb, path } => Op::method(verb.clone(), path.clone()),
            OpEntry::Query(QueryEntry::Names(names)) => Op::Query(names.clone()),
            OpEntry::Query(QueryEntry::Fields(fields)) => Op::QueryFields(
                fields
                    .iter()
                    .map(|(key, field)| {
                        let field = match field {
                            QueryFieldEntry::Literal(value) => QueryField::Equals(value.clone()),
                            QueryFieldEntry::Typed { ty } => QueryField::Typed(ty.clone()),
                        };
                        (key.clone(), field)
                    })
                    .collect(),
            ),
            OpEntry::QueryString(QueryStringEntry::Literal(qs)) => {
                Op::QueryString(QueryStringMatch::Equals(qs.clone()))
            }
            OpEntry::QueryString(QueryStringEntry::Pattern { matches }) => {
                Op::QueryString(QueryStringMatch::Matches(matches.clone()))
            }
        })
    }
}

/// `query: [a, b]` or `query: { key: literal, page: { type: integer } }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryEntry {
    Names(Vec<String>),
    Fields(BTreeMap<String, QueryFieldEntry>),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryFieldEntry {
    Literal(String),
    Typed {
        #[serde(rename = "type")]
        ty: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryStringEntry {
    Literal(String),
    Pattern { matches: String },
}

fn default_status() -> u16 {
    200
}

/// A response as written in configuration: a status code, a status name
/// (`ok`, `not_found`, ...) or a full triple.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseEntry {
    Code(u16),
    Name(String),
    Full {
        #[serde(default = "default_status")]
        status: u16,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: String,
    },
}

impl ResponseEntry {
    /// Build the response, rejecting unknown statuses and malformed headers.
    pub fn to_response(&self) -> Result<Response, RouteError> {
        Ok(match self {
            ResponseEntry::Code(code) => Response::new(status_code(*code)?),
            ResponseEntry::Name(name) => status_named(name)?.into_response(),
            ResponseEntry::Full {
                status,
                headers,
                body,
            } => {
                let mut response = Response::new(status_code(*status)?).with_body(body.clone());
                for (name, value) in headers {
                    let header = HeaderName::try_from(name.as_str())
                        .ok()
                        .zip(HeaderValue::try_from(value.as_str()).ok())
                        .ok_or_else(|| RouteError::InvalidHeader(name.clone()))?;
                    response.headers.insert(header.0, header.1);
                }
                response
            }
        })
    }
}

fn status_code(code: u16) -> Result<StatusCode, RouteError> {
    StatusCode::from_u16(code).map_err(|_| RouteError::InvalidStatus(code))
}

/// Fill `{0}`, `{1}`, ... in the body with captured values. Strings are
/// inserted as-is, other values as JSON. Unknown indexes are left alone.
fn render(response: &Response, args: Args<'_>) -> Response {
    if args.is_empty() || !response.body.contains('{') {
        return response.clone();
    }
    let body = PLACEHOLDER.replace_all(&response.body, |caps: &Captures| {
        let value = caps[1].parse::<usize>().ok().and_then(|i| args.get(i));
        match value {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        }
    });
    response.clone().with_body(body.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_entries() {
        let file = RouteFile::from_yaml_str(
            r#"
routes:
  - path: blog
    routes:
      - var: integer
        then: [{ get: ~ }]
        respond: { body: "post {0}" }
      - multi_var: { count: 2, type: integer }
        respond: 204
      - query: [a, b]
        respond: ok
      - query: { key: value, page: { type: integer } }
        respond: 200
      - query_string: { matches: "foo=\\d+" }
        respond: accepted
"#,
        )
        .unwrap();
        assert_eq!(file.routes.len(), 1);
        let blog = &file.routes[0];
        assert!(matches!(blog.op, OpEntry::Path(ref p) if p == "blog"));
        assert_eq!(blog.routes.len(), 5);
        assert!(matches!(blog.routes[0].op, OpEntry::Var(Some(ref t)) if t == "integer"));
        assert!(matches!(blog.routes[0].then[0].op, OpEntry::Get(None)));
        assert!(matches!(
            blog.routes[1].op,
            OpEntry::MultiVar { count: Some(2), .. }
        ));
        assert!(matches!(blog.routes[2].op, OpEntry::Query(QueryEntry::Names(_))));
        assert!(matches!(blog.routes[3].op, OpEntry::Query(QueryEntry::Fields(_))));

        let routes = file.to_routes().unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_entry_needs_one_terminal() {
        let file = RouteFile::from_yaml_str("routes:\n  - path: a\n").unwrap();
        assert!(matches!(
            file.to_routes(),
            Err(ConfigError::InvalidRoute { ref op, .. }) if op == "path"
        ));
    }

    #[test]
    fn test_multi_var_needs_count_or_range() {
        let entry = OpEntry::MultiVar {
            count: None,
            min: Some(1),
            max: None,
            ty: None,
        };
        assert!(entry.to_op().is_err());
    }

    #[test]
    fn test_response_entries() {
        assert_eq!(ResponseEntry::Code(404).to_response().unwrap().status, 404);
        assert_eq!(
            ResponseEntry::Name("created".into()).to_response().unwrap().status,
            201
        );
        assert!(matches!(
            ResponseEntry::Name("nope".into()).to_response(),
            Err(RouteError::UnknownStatus(_))
        ));
        assert!(matches!(
            ResponseEntry::Code(1234).to_response(),
            Err(RouteError::InvalidStatus(1234))
        ));
    }

    #[test]
    fn test_response_headers_are_validated() {
        let entry = ResponseEntry::Full {
            status: 200,
            headers: BTreeMap::from([
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ]),
            body: String::new(),
        };
        let response = entry.to_response().unwrap();
        assert_eq!(response.headers.len(), 1);

        let entry = ResponseEntry::Full {
            status: 200,
            headers: BTreeMap::from([("bad name".to_string(), "x".to_string())]),
            body: String::new(),
        };
        assert!(matches!(
            entry.to_response(),
            Err(RouteError::InvalidHeader(ref name)) if name == "bad name"
        ));
    }

    #[test]
    fn test_then_list_loads_and_dispatches() {
        let file = RouteFile::from_yaml_str(
            "routes:\n  - path: a\n    then: [{ get: ~ }, { no_extension: ~ }]\n    respond: 200\n",
        )
        .unwrap();
        assert_eq!(file.routes[0].then.len(), 2);
        assert!(matches!(file.routes[0].then[1].op, OpEntry::NoExtension));

        let app = crate::App::new(crate::VariableTypes::new(), file.to_routes().unwrap()).unwrap();
        assert_eq!(app.dispatch(crate::Request::get("/a")).unwrap().status, 200);
        assert_eq!(app.dispatch(crate::Request::post("/a")).unwrap().status, 404);
    }

    #[test]
    fn test_render_placeholders() {
        let response = Response::new(StatusCode::OK).with_body("{0} has {1} ({2})");
        let values = vec![json!("post"), json!([1, 2])];
        let rendered = render(&response, Args::new(&values));
        assert_eq!(rendered.body, "post has [1,2] ({2})");
    }
}
