//! Route trees resolved against a variable type registry, and their
//! evaluation.
//!
//! Compilation turns every [`Op`] into a [`CompiledOp`]: type names are looked
//! up, ad-hoc patterns are compiled, arities are validated. Anything wrong
//! with the declaration surfaces here as a [`RouteError`], before the first
//! request is dispatched.
//!
//! Evaluation walks the tree depth-first. For each declaration the op is
//! tested against the current cursor; on a match the consumed text is scoped
//! onto the cursor, the captured values are pushed onto the argument stack,
//! the continuation runs, and both are put back before the next sibling is
//! tried.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::chain::{Args, Handler, Next, Routes};
use super::op::{Arity, Op, QueryField, QueryStringMatch, VarType};
use crate::error::{Interrupt, RouteError, Step};
use crate::matcher::{Capture, Matcher, VariableTypes};
use crate::request::RequestContext;

/// Query value requirement with its type resolved.
#[derive(Debug, Clone)]
pub enum CompiledQueryField {
    Equals(String),
    Typed(Arc<Matcher>),
}

#[derive(Debug, Clone)]
pub enum CompiledQueryString {
    Equals(String),
    Matches(Regex),
}

/// A route operation ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledOp {
    Path(String),
    ExactPath(String),
    WholePath(String),
    Part(String),
    PartPattern(Regex),
    Var {
        /// `None` is the extension-aware default segment.
        matcher: Option<Arc<Matcher>>,
        arity: Arity,
        separated: bool,
    },
    Extension(String),
    NoExtension,
    Remainder,
    Complete,
    Method {
        verb: String,
        path: Option<String>,
    },
    Query(Vec<String>),
    QueryFields(Vec<(String, CompiledQueryField)>),
    QueryString(CompiledQueryString),
}

/// Outcome of a successful op test: how much of the remaining path to
/// consume and which values to hand on.
#[derive(Debug, Default, PartialEq)]
struct Matched {
    len: usize,
    values: Vec<Value>,
}

impl Matched {
    fn consume(len: usize) -> Self {
        Matched {
            len,
            values: Vec::new(),
        }
    }

    fn with_value(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }
}

#[derive(Clone)]
enum CompiledNext {
    Handler(Handler),
    Routes(CompiledRoutes),
}

#[derive(Clone)]
struct CompiledRoute {
    kind: &'static str,
    op: CompiledOp,
    next: CompiledNext,
}

/// An immutable, shareable route tree.
#[derive(Clone, Default)]
pub struct CompiledRoutes {
    routes: Vec<CompiledRoute>,
}

impl CompiledRoutes {
    /// Resolve `routes` against `types`.
    pub fn compile(routes: &Routes, types: &VariableTypes) -> Result<Self, RouteError> {
        let routes = routes
            .routes()
            .iter()
            .map(|route| -> Result<CompiledRoute, RouteError> {
                Ok(CompiledRoute {
                    kind: route.op.kind(),
                    op: CompiledOp::compile(&route.op, types)?,
                    next: match &route.next {
                        Next::Handler(handler) => CompiledNext::Handler(handler.clone()),
                        Next::Routes(nested) => {
                            CompiledNext::Routes(CompiledRoutes::compile(nested, types)?)
                        }
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CompiledRoutes { routes })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Try each declaration in order. Returns `Ok(())` when none of them
    /// produced a response.
    pub fn evaluate(&self, ctx: &mut RequestContext, args: &mut Vec<Value>) -> Step {
        for route in &self.routes {
            route.evaluate(ctx, args)?;
        }
        Ok(())
    }
}

impl CompiledRoute {
    fn evaluate(&self, ctx: &mut RequestContext, args: &mut Vec<Value>) -> Step {
        let attempt = self.op.attempt(ctx).map_err(|err| err.raised_in(ctx));
        let Some(matched) = attempt? else {
            return Ok(());
        };
        tracing::trace!(
            "{} matched {:?} with {} value(s)",
            self.kind,
            &ctx.remaining()[..matched.len],
            matched.values.len()
        );
        let depth = args.len();
        args.extend(matched.values);
        let result = ctx.with_consumed(matched.len, |ctx| match &self.next {
            CompiledNext::Handler(handler) => {
                handler(&*ctx, Args::new(args)).map_err(|err| err.raised_in(ctx))
            }
            CompiledNext::Routes(nested) => nested.evaluate(ctx, args),
        });
        args.truncate(depth);
        result
    }
}

impl CompiledOp {
    pub fn compile(op: &Op, types: &VariableTypes) -> Result<Self, RouteError> {
        Ok(match op {
            Op::Path(p) => CompiledOp::Path(p.clone()),
            Op::ExactPath(p) => CompiledOp::ExactPath(p.clone()),
            Op::WholePath(p) => CompiledOp::WholePath(p.clone()),
            Op::Part(p) => CompiledOp::Part(p.clone()),
            Op::PartPattern(pattern) => CompiledOp::PartPattern(compile_regex(
                pattern,
                &format!("^/?(?:{pattern})"),
            )?),
            Op::Var {
                ty,
                arity,
                separated,
            } => {
                if let Arity::Between(min, max) = *arity {
                    if min > max {
                        return Err(RouteError::InvalidArity { min, max });
                    }
                }
                let matcher = match ty {
                    VarType::Segment => None,
                    VarType::Named(name) => Some(types.lookup(name)?),
                    VarType::Pattern(pattern) => Some(Arc::new(Matcher::pattern(pattern)?)),
                };
                CompiledOp::Var {
                    matcher,
                    arity: *arity,
                    separated: *separated,
                }
            }
            Op::Extension(ext) => CompiledOp::Extension(ext.trim_start_matches('.').to_string()),
            Op::NoExtension => CompiledOp::NoExtension,
            Op::Remainder => CompiledOp::Remainder,
            Op::Complete => CompiledOp::Complete,
            Op::Method { verb, path } => CompiledOp::Method {
                verb: verb.clone(),
                path: path.clone(),
            },
            Op::Query(names) => CompiledOp::Query(names.clone()),
            Op::QueryFields(fields) => CompiledOp::QueryFields(
                fields
                    .iter()
                    .map(|(key, field)| -> Result<_, RouteError> {
                        let field = match field {
                            QueryField::Equals(literal) => {
                                CompiledQueryField::Equals(literal.clone())
                            }
                            QueryField::Typed(name) => {
                                CompiledQueryField::Typed(types.lookup(name)?)
                            }
                        };
                        Ok((key.clone(), field))
                    })
                    .collect::<Result<Vec<_>, RouteError>>()?,
            ),
            Op::QueryString(QueryStringMatch::Equals(literal)) => {
                CompiledOp::QueryString(CompiledQueryString::Equals(literal.clone()))
            }
            Op::QueryString(QueryStringMatch::Matches(pattern)) => CompiledOp::QueryString(
                CompiledQueryString::Matches(compile_regex(pattern, pattern)?),
            ),
        })
    }

    /// Test the op against the current cursor without moving it.
    fn attempt(&self, ctx: &RequestContext) -> Result<Option<Matched>, Interrupt> {
        let remaining = ctx.remaining();
        let extension = ctx.extension();
        Ok(match self {
            CompiledOp::Path(p) => literal_segment(remaining, p, extension).map(Matched::consume),
            CompiledOp::ExactPath(p) => exact_prefix(remaining, p).map(Matched::consume),
            CompiledOp::WholePath(p) => whole_path(ctx, p).map(Matched::consume),
            CompiledOp::Part(p) => {
                let rest = remaining.strip_prefix('/').unwrap_or(remaining);
                rest.strip_prefix(p.as_str())
                    .map(|after| Matched::consume(remaining.len() - after.len()))
            }
            CompiledOp::PartPattern(regex) => regex.find(remaining).map(|m| Matched::consume(m.end())),
            CompiledOp::Var {
                matcher,
                arity,
                separated,
            } => attempt_variable(ctx, matcher.as_deref(), *arity, *separated)?,
            CompiledOp::Extension(ext) => {
                if extension != Some(ext.as_str()) {
                    return Ok(None);
                }
                let dotted = format!(".{ext}");
                let len = if remaining == dotted || remaining.strip_prefix('/') == Some(dotted.as_str()) {
                    remaining.len()
                } else {
                    0
                };
                Some(Matched::consume(len))
            }
            CompiledOp::NoExtension => extension.is_none().then(Matched::default),
            CompiledOp::Remainder => Some(
                Matched::consume(remaining.len()).with_value(Value::String(remaining.to_string())),
            ),
            CompiledOp::Complete => complete(ctx, 0).map(Matched::consume),
            CompiledOp::Method { verb, path } => {
                if ctx.method() != verb {
                    return Ok(None);
                }
                let len = match path {
                    Some(p) => whole_path(ctx, p),
                    None => complete(ctx, 0),
                };
                len.map(Matched::consume)
            }
            CompiledOp::Query(names) => names
                .iter()
                .map(|name| ctx.query(name).map(|v| Value::String(v.to_string())))
                .collect::<Option<Vec<_>>>()
                .map(|values| Matched { len: 0, values }),
            CompiledOp::QueryFields(fields) => {
                let mut object = Map::new();
                for (key, field) in fields {
                    let Some(raw) = ctx.query(key) else {
                        return Ok(None);
                    };
                    let value = match field {
                        CompiledQueryField::Equals(literal) if literal == raw => {
                            Value::String(raw.to_string())
                        }
                        CompiledQueryField::Equals(_) => return Ok(None),
                        CompiledQueryField::Typed(matcher) => match matcher.attempt_whole(raw)? {
                            Some(capture) => capture.value,
                            None => return Ok(None),
                        },
                    };
                    object.insert(key.clone(), value);
                }
                Some(Matched::default().with_value(Value::Object(object)))
            }
            CompiledOp::QueryString(CompiledQueryString::Equals(literal)) => {
                (ctx.query_string() == literal).then(Matched::default)
            }
            CompiledOp::QueryString(CompiledQueryString::Matches(regex)) => {
                regex.is_match(ctx.query_string()).then(Matched::default)
            }
        })
    }
}

fn compile_regex(name: &str, source: &str) -> Result<Regex, RouteError> {
    Regex::new(source).map_err(|source| RouteError::InvalidPattern {
        name: name.to_string(),
        source,
    })
}

/// `/literal` at a segment boundary. A trailing `/` is consumed too when it
/// is itself followed by a boundary, so `/foo/` is used up entirely while
/// `/foo/bar` leaves `/bar`.
fn literal_segment(remaining: &str, literal: &str, extension: Option<&str>) -> Option<usize> {
    let len = exact_prefix(remaining, literal)?;
    let at_boundary = |rest: &str| {
        rest.is_empty()
            || rest.starts_with('/')
            || extension.is_some_and(|ext| {
                rest.strip_prefix('.')
                    .is_some_and(|after| after.starts_with(ext))
            })
    };
    let rest = &remaining[len..];
    if let Some(after_slash) = rest.strip_prefix('/') {
        if at_boundary(after_slash) {
            return Some(len + 1);
        }
    }
    at_boundary(rest).then_some(len)
}

/// `/literal` with no boundary check. A leading `/` on the literal is
/// optional.
fn exact_prefix(remaining: &str, literal: &str) -> Option<usize> {
    let literal = literal.strip_prefix('/').unwrap_or(literal);
    let rest = remaining.strip_prefix('/')?.strip_prefix(literal)?;
    Some(remaining.len() - rest.len())
}

/// Nothing left after `offset`, or the request is for the index. Consumes
/// everything.
fn complete(ctx: &RequestContext, offset: usize) -> Option<usize> {
    let remaining = ctx.remaining();
    (remaining.len() == offset || ctx.is_index()).then_some(remaining.len())
}

fn whole_path(ctx: &RequestContext, literal: &str) -> Option<usize> {
    let len = literal_segment(ctx.remaining(), literal, ctx.extension())?;
    complete(ctx, len)
}

/// One path segment: everything up to the next `/`. When the segment is the
/// last one and ends in the detected extension, the `.ext` is left behind.
fn default_segment<'a>(input: &'a str, extension: Option<&str>) -> Option<&'a str> {
    let end = input.find('/').unwrap_or(input.len());
    let whole = &input[..end];
    let segment = match extension {
        Some(ext) if end == input.len() => whole
            .strip_suffix(ext)
            .and_then(|stem| stem.strip_suffix('.'))
            .unwrap_or(whole),
        _ => whole,
    };
    (!segment.is_empty()).then_some(segment)
}

fn attempt_variable(
    ctx: &RequestContext,
    matcher: Option<&Matcher>,
    arity: Arity,
    separated: bool,
) -> Result<Option<Matched>, Interrupt> {
    let remaining = ctx.remaining();
    let mut offset = 0;
    let mut values = Vec::new();

    while arity.max().map_or(true, |max| values.len() < max) {
        let mut at = offset;
        if separated {
            if !remaining[at..].starts_with('/') {
                break;
            }
            at += 1;
        }
        let input = &remaining[at..];
        let capture = match matcher {
            Some(matcher) => matcher.attempt(input)?,
            None => default_segment(input, ctx.extension()).map(|text| Capture {
                text: text.to_string(),
                value: Value::String(text.to_string()),
            }),
        };
        // A separator without a value after it is left unconsumed.
        let Some(capture) = capture else { break };
        let next = at + capture.text.len();
        if next == offset {
            break;
        }
        offset = next;
        values.push(capture.value);
    }

    if !arity.accepts(values.len()) {
        return Ok(None);
    }
    let value = match arity {
        Arity::One => values.pop().unwrap_or(Value::Null),
        _ => Value::Array(values),
    };
    Ok(Some(Matched::consume(offset).with_value(value)))
}

impl fmt::Debug for CompiledRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|route| {
                let nested = match &route.next {
                    CompiledNext::Handler(_) => None,
                    CompiledNext::Routes(routes) => Some(routes),
                };
                (&route.op, nested)
            }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::halt;
    use crate::request::Request;
    use serde_json::json;

    fn ctx(target: &str) -> RequestContext {
        RequestContext::new(Request::get(target))
    }

    fn attempt(op: Op, target: &str) -> Option<Matched> {
        let types = VariableTypes::new();
        CompiledOp::compile(&op, &types)
            .unwrap()
            .attempt(&ctx(target))
            .unwrap()
    }

    fn consumed(op: Op, target: &str) -> Option<usize> {
        attempt(op, target).map(|m| m.len)
    }

    #[test]
    fn test_literal_segment_boundaries() {
        assert_eq!(consumed(Op::Path("foo".into()), "/foo"), Some(4));
        assert_eq!(consumed(Op::Path("foo".into()), "/foo/"), Some(5));
        assert_eq!(consumed(Op::Path("foo".into()), "/foo/bar"), Some(4));
        assert_eq!(consumed(Op::Path("/foo".into()), "/foo/bar"), Some(4));
        assert_eq!(consumed(Op::Path("foo".into()), "/foobar"), None);
        assert_eq!(consumed(Op::Path("foo".into()), "foo"), None);
    }

    #[test]
    fn test_literal_segment_before_extension() {
        assert_eq!(consumed(Op::Path("report".into()), "/report.json"), Some(7));
        assert_eq!(consumed(Op::Path("report".into()), "/report.jsonx/a"), None);
    }

    #[test]
    fn test_literal_is_not_a_pattern() {
        assert_eq!(consumed(Op::Path("a.c".into()), "/abc"), None);
        assert_eq!(consumed(Op::Path("a.c".into()), "/a.c"), Some(4));
    }

    #[test]
    fn test_root_path() {
        assert_eq!(consumed(Op::Path("/".into()), "/"), Some(1));
        assert_eq!(consumed(Op::Path("".into()), "/foo"), None);
    }

    #[test]
    fn test_exact_prefix_ignores_boundary() {
        assert_eq!(consumed(Op::ExactPath("foo".into()), "/foobar"), Some(4));
        assert_eq!(consumed(Op::ExactPath("foo".into()), "/bar"), None);
    }

    #[test]
    fn test_part_optional_slash() {
        assert_eq!(consumed(Op::Part("foo".into()), "/foobar"), Some(4));
        assert_eq!(consumed(Op::Part("foo".into()), "foobar"), Some(3));
        assert_eq!(consumed(Op::PartPattern("[a-z]+".into()), "/abc1"), Some(4));
        assert_eq!(consumed(Op::PartPattern("[a-z]+".into()), "x/abc"), Some(1));
        assert_eq!(consumed(Op::PartPattern("[a-z]+".into()), "1abc"), None);
    }

    #[test]
    fn test_default_segment_stops_at_extension() {
        assert_eq!(default_segment("report.json", Some("json")), Some("report"));
        assert_eq!(default_segment("report.json", None), Some("report.json"));
        assert_eq!(default_segment("a.json/b", Some("json")), Some("a.json"));
        assert_eq!(default_segment(".json", Some("json")), None);
        assert_eq!(default_segment("", None), None);
    }

    #[test]
    fn test_variable_single() {
        let matched = attempt(Op::var(VarType::Segment, Arity::One), "/hey/there").unwrap();
        assert_eq!(matched.len, 4);
        assert_eq!(matched.values, vec![json!("hey")]);
    }

    #[test]
    fn test_variable_typed_rejects() {
        assert!(attempt(Op::var("integer".into(), Arity::One), "/abc").is_none());
        let matched = attempt(Op::var("int".into(), Arity::One), "/12abc").unwrap();
        assert_eq!(matched.values, vec![json!(12)]);
    }

    #[test]
    fn test_variable_counted() {
        let matched = attempt(Op::var("integer".into(), Arity::Exactly(2)), "/1/2/3").unwrap();
        assert_eq!(matched.len, 4);
        assert_eq!(matched.values, vec![json!([1, 2])]);

        assert!(attempt(Op::var("integer".into(), Arity::Exactly(2)), "/1/x").is_none());
    }

    #[test]
    fn test_variable_range() {
        let op = || Op::var("integer".into(), Arity::Between(1, 3));
        assert_eq!(attempt(op(), "/1/2").unwrap().values, vec![json!([1, 2])]);
        assert_eq!(
            attempt(op(), "/1/2/3/4").unwrap().values,
            vec![json!([1, 2, 3])]
        );
        assert!(attempt(op(), "/x").is_none());
    }

    #[test]
    fn test_glob_accepts_zero_and_leaves_dangling_separator() {
        let matched = attempt(Op::var("integer".into(), Arity::Repeating), "/abc").unwrap();
        assert_eq!(matched.len, 0);
        assert_eq!(matched.values, vec![json!([])]);

        let matched = attempt(Op::var("integer".into(), Arity::Repeating), "/1/2/x").unwrap();
        assert_eq!(matched.len, 4);
        assert_eq!(matched.values, vec![json!([1, 2])]);
    }

    #[test]
    fn test_partial_variable_needs_no_slash() {
        let matched = attempt(Op::partial_var("integer".into()), "12/rest").unwrap();
        assert_eq!(matched.len, 2);
        assert!(attempt(Op::partial_var("integer".into()), "/12").is_none());
    }

    #[test]
    fn test_extension_consumes_suffix() {
        let mut ctx = ctx("/report.json");
        let types = VariableTypes::new();
        let op = CompiledOp::compile(&Op::Extension("json".into()), &types).unwrap();

        // Nothing matched yet: the suffix is not at the front.
        assert_eq!(op.attempt(&ctx).unwrap(), Some(Matched::consume(0)));

        ctx.with_consumed(7, |ctx| {
            assert_eq!(op.attempt(ctx).unwrap(), Some(Matched::consume(5)));
        });

        let other = CompiledOp::compile(&Op::Extension("xml".into()), &types).unwrap();
        assert!(other.attempt(&ctx).unwrap().is_none());
        assert!(CompiledOp::NoExtension.attempt(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_complete_and_remainder() {
        assert_eq!(consumed(Op::Complete, "/"), Some(1));
        assert_eq!(consumed(Op::Complete, ""), Some(0));
        assert_eq!(consumed(Op::Complete, "/a"), None);

        let matched = attempt(Op::Remainder, "/a/b").unwrap();
        assert_eq!(matched.len, 4);
        assert_eq!(matched.values, vec![json!("/a/b")]);
    }

    #[test]
    fn test_method_gate() {
        assert_eq!(consumed(Op::method("get", None), "/"), Some(1));
        assert_eq!(consumed(Op::method("post", None), "/"), None);
        assert_eq!(consumed(Op::method("get", None), "/a"), None);
        assert_eq!(consumed(Op::method("get", Some("a".into())), "/a"), Some(2));
        assert_eq!(consumed(Op::method("get", Some("a".into())), "/a/b"), None);
    }

    #[test]
    fn test_query_by_name() {
        let matched = attempt(Op::Query(vec!["a".into(), "b".into()]), "/?a=1&b=2").unwrap();
        assert_eq!(matched.len, 0);
        assert_eq!(matched.values, vec![json!("1"), json!("2")]);
        assert!(attempt(Op::Query(vec!["a".into(), "c".into()]), "/?a=1&b=2").is_none());
    }

    #[test]
    fn test_query_fields() {
        let fields = || {
            Op::QueryFields(vec![
                ("key".into(), QueryField::from("value")),
                ("page".into(), QueryField::typed("integer")),
            ])
        };
        let matched = attempt(fields(), "/?key=value&page=3").unwrap();
        assert_eq!(matched.values, vec![json!({"key": "value", "page": 3})]);
        assert!(attempt(fields(), "/?key=other&page=3").is_none());
        assert!(attempt(fields(), "/?key=value&page=3x").is_none());
    }

    #[test]
    fn test_query_string() {
        assert!(attempt(Op::QueryString("foo=bar".into()), "/?foo=bar").is_some());
        assert!(attempt(Op::QueryString("foo=bar".into()), "/?foo=baz").is_none());
        assert!(attempt(
            Op::QueryString(QueryStringMatch::matches("foo=\\d+")),
            "/?x=1&foo=22"
        )
        .is_some());
    }

    #[test]
    fn test_compile_errors() {
        let types = VariableTypes::new();
        assert!(matches!(
            CompiledOp::compile(&Op::var("uuid".into(), Arity::One), &types),
            Err(RouteError::UnknownVariableType(_))
        ));
        assert!(matches!(
            CompiledOp::compile(&Op::var(VarType::Segment, Arity::Between(3, 1)), &types),
            Err(RouteError::InvalidArity { min: 3, max: 1 })
        ));
        assert!(matches!(
            CompiledOp::compile(&Op::PartPattern("(".into()), &types),
            Err(RouteError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_evaluate_restores_cursor_and_args() {
        let routes = Routes::build(|r| {
            r.path("a").var().nest(|inner| {
                inner.path("never").respond(200u16);
            });
            r.path("a").var().remainder().to(|ctx, args| {
                assert_eq!(ctx.consumed(), "/a/1/x");
                assert_eq!(args.as_slice(), &[json!("1"), json!("/x")]);
                halt(204u16)
            });
        });
        let compiled = CompiledRoutes::compile(&routes, &VariableTypes::new()).unwrap();
        let mut ctx = ctx("/a/1/x");
        let mut args = Vec::new();
        match compiled.evaluate(&mut ctx, &mut args) {
            Err(Interrupt::Halt(response)) => assert_eq!(response.status, 204),
            other => panic!("expected halt, got {other:?}"),
        }
        assert_eq!(ctx.remaining(), "/a/1/x");
        assert!(args.is_empty());
    }
}
