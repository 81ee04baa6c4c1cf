//! Declarative route operations.
//!
//! An [`Op`] is one matching step as written by the route author. Ops hold
//! names and pattern sources only; they are resolved against the variable
//! type registry when an [`App`](crate::App) is built.

use regex::Regex;
use std::ops::RangeInclusive;

/// How many values a variable operation captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one value, passed on unwrapped.
    One,
    /// Exactly `n` values, passed on as a list.
    Exactly(usize),
    /// Between `min` and `max` values inclusive, passed on as a list.
    Between(usize, usize),
    /// As many values as match, passed on as a list (possibly empty).
    Repeating,
}

impl Arity {
    pub(crate) fn max(self) -> Option<usize> {
        match self {
            Arity::One => Some(1),
            Arity::Exactly(n) => Some(n),
            Arity::Between(_, max) => Some(max),
            Arity::Repeating => None,
        }
    }

    pub(crate) fn accepts(self, count: usize) -> bool {
        match self {
            Arity::One => count == 1,
            Arity::Exactly(n) => count == n,
            Arity::Between(min, max) => (min..=max).contains(&count),
            Arity::Repeating => true,
        }
    }
}

/// A count of one captures a bare value, like a plain variable.
impl From<usize> for Arity {
    fn from(n: usize) -> Self {
        match n {
            1 => Arity::One,
            n => Arity::Exactly(n),
        }
    }
}

impl From<RangeInclusive<usize>> for Arity {
    fn from(range: RangeInclusive<usize>) -> Self {
        Arity::Between(*range.start(), *range.end())
    }
}

/// The matcher a variable operation uses.
#[derive(Debug, Clone)]
pub enum VarType {
    /// One path segment, stopping short of a detected extension.
    Segment,
    /// A type registered under this name.
    Named(String),
    /// An ad-hoc regex source.
    Pattern(String),
}

impl From<&str> for VarType {
    fn from(name: &str) -> Self {
        VarType::Named(name.to_string())
    }
}

impl From<String> for VarType {
    fn from(name: String) -> Self {
        VarType::Named(name)
    }
}

impl From<Regex> for VarType {
    fn from(regex: Regex) -> Self {
        VarType::Pattern(regex.as_str().to_string())
    }
}

/// Requirement on a single query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryField {
    /// The value must equal this literal.
    Equals(String),
    /// The whole value must match this registered type.
    Typed(String),
}

impl QueryField {
    pub fn typed(name: impl Into<String>) -> Self {
        QueryField::Typed(name.into())
    }
}

impl From<&str> for QueryField {
    fn from(literal: &str) -> Self {
        QueryField::Equals(literal.to_string())
    }
}

impl From<String> for QueryField {
    fn from(literal: String) -> Self {
        QueryField::Equals(literal)
    }
}

/// Requirement on the raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStringMatch {
    Equals(String),
    /// Unanchored regex search.
    Matches(String),
}

impl QueryStringMatch {
    pub fn matches(pattern: impl Into<String>) -> Self {
        QueryStringMatch::Matches(pattern.into())
    }
}

impl From<&str> for QueryStringMatch {
    fn from(literal: &str) -> Self {
        QueryStringMatch::Equals(literal.to_string())
    }
}

/// One matching step of a route declaration.
#[derive(Debug, Clone)]
pub enum Op {
    /// Literal segment(s), matched up to a segment boundary.
    Path(String),
    /// Literal prefix after a leading `/`, without boundary check.
    ExactPath(String),
    /// Literal segment(s) that must consume the rest of the path.
    WholePath(String),
    /// Literal prefix with an optional leading `/`.
    Part(String),
    /// Regex prefix with an optional leading `/`.
    PartPattern(String),
    /// Typed path variable(s).
    Var {
        ty: VarType,
        arity: Arity,
        /// Require a `/` before every value.
        separated: bool,
    },
    Extension(String),
    NoExtension,
    /// Everything left, passed on as text.
    Remainder,
    /// Nothing left (or the request is for the index).
    Complete,
    /// HTTP method gate, optionally with a whole-path literal.
    Method { verb: String, path: Option<String> },
    /// Named query values, passed on positionally.
    Query(Vec<String>),
    /// Query values checked per key, passed on as one object.
    QueryFields(Vec<(String, QueryField)>),
    QueryString(QueryStringMatch),
}

impl Op {
    pub fn var(ty: VarType, arity: Arity) -> Self {
        Op::Var {
            ty,
            arity,
            separated: true,
        }
    }

    pub fn partial_var(ty: VarType) -> Self {
        Op::Var {
            ty,
            arity: Arity::One,
            separated: false,
        }
    }

    pub fn method(verb: impl Into<String>, path: Option<String>) -> Self {
        Op::Method {
            verb: verb.into().to_ascii_uppercase(),
            path,
        }
    }

    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Op::Path(_) => "path",
            Op::ExactPath(_) => "exact_path",
            Op::WholePath(_) => "whole_path",
            Op::Part(_) | Op::PartPattern(_) => "part",
            Op::Var { .. } => "var",
            Op::Extension(_) => "extension",
            Op::NoExtension => "no_extension",
            Op::Remainder => "remainder",
            Op::Complete => "complete",
            Op::Method { .. } => "method",
            Op::Query(_) | Op::QueryFields(_) => "query",
            Op::QueryString(_) => "query_string",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_bounds() {
        assert!(Arity::One.accepts(1));
        assert!(!Arity::One.accepts(2));
        assert!(Arity::from(2).accepts(2));
        assert!(!Arity::from(2).accepts(1));
        assert_eq!(Arity::from(1), Arity::One);

        let between = Arity::from(1..=3);
        assert_eq!(between.max(), Some(3));
        assert!(between.accepts(1) && between.accepts(3));
        assert!(!between.accepts(0) && !between.accepts(4));

        assert!(Arity::Repeating.accepts(0));
        assert_eq!(Arity::Repeating.max(), None);
    }

    #[test]
    fn test_method_is_uppercased() {
        match Op::method("get", None) {
            Op::Method { verb, path } => {
                assert_eq!(verb, "GET");
                assert!(path.is_none());
            }
            other => panic!("unexpected op {other:?}"),
        }
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(VarType::from("integer"), VarType::Named(ref n) if n == "integer"));
        assert_eq!(QueryField::from("value"), QueryField::Equals("value".into()));
        assert_eq!(
            QueryStringMatch::from("foo=bar"),
            QueryStringMatch::Equals("foo=bar".into())
        );
    }
}
