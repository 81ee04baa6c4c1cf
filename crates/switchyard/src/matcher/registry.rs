//! Named variable types.
//!
//! The registry maps a type name (`integer`, `slug`, ...) to a [`Matcher`].
//! It is mutated only while an application is being set up; once handed to
//! [`App`](crate::App) it is frozen behind an `Arc` and shared read-only by
//! every dispatch.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::Matcher;
use crate::error::{Interrupt, RouteError};

/// How a variable type is declared.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    /// A ready-made matcher, stored as-is.
    Matcher(Matcher),
    /// A regex source compiled into a plain matcher.
    Pattern(String),
    /// A pre-compiled regex.
    Regex(Regex),
    /// Existing type names, tried in order.
    AnyOf(Vec<String>),
    /// Another name for an existing type.
    Alias(String),
}

impl TypeSpec {
    pub fn alias(name: impl Into<String>) -> Self {
        TypeSpec::Alias(name.into())
    }

    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeSpec::AnyOf(names.into_iter().map(Into::into).collect())
    }
}

impl From<Matcher> for TypeSpec {
    fn from(matcher: Matcher) -> Self {
        TypeSpec::Matcher(matcher)
    }
}

impl From<&str> for TypeSpec {
    fn from(pattern: &str) -> Self {
        TypeSpec::Pattern(pattern.to_string())
    }
}

impl From<String> for TypeSpec {
    fn from(pattern: String) -> Self {
        TypeSpec::Pattern(pattern)
    }
}

impl From<Regex> for TypeSpec {
    fn from(regex: Regex) -> Self {
        TypeSpec::Regex(regex)
    }
}

impl<const N: usize> From<[&str; N]> for TypeSpec {
    fn from(names: [&str; N]) -> Self {
        TypeSpec::any_of(names)
    }
}

/// Registry of named variable types.
#[derive(Debug, Clone)]
pub struct VariableTypes {
    types: HashMap<String, Arc<Matcher>>,
}

impl Default for VariableTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableTypes {
    /// A registry seeded with `integer` and its alias `int`.
    pub fn new() -> Self {
        let mut types = VariableTypes::empty();
        types.insert("integer", Matcher::integer());
        types.insert("int", Matcher::integer());
        types
    }

    pub fn empty() -> Self {
        VariableTypes {
            types: HashMap::new(),
        }
    }

    fn insert(&mut self, name: &str, matcher: Matcher) -> Arc<Matcher> {
        let matcher = Arc::new(matcher.named(name));
        self.types.insert(name.to_string(), matcher.clone());
        matcher
    }

    /// Register `name`, replacing any earlier type of the same name.
    ///
    /// Composite and alias declarations resolve their referenced names now,
    /// so later re-registration of a referenced name does not affect them.
    pub fn register(
        &mut self,
        name: &str,
        spec: impl Into<TypeSpec>,
    ) -> Result<Arc<Matcher>, RouteError> {
        let matcher = self.resolve(name, spec)?;
        tracing::debug!("Registered variable type '{}'", name);
        Ok(self.insert(name, matcher))
    }

    /// Build the matcher `spec` describes without registering it.
    pub fn resolve(&self, name: &str, spec: impl Into<TypeSpec>) -> Result<Matcher, RouteError> {
        Ok(match spec.into() {
            TypeSpec::Matcher(matcher) => matcher,
            TypeSpec::Pattern(pattern) => {
                Matcher::pattern(&pattern).map_err(|err| match err {
                    RouteError::InvalidPattern { source, .. } => RouteError::InvalidPattern {
                        name: name.to_string(),
                        source,
                    },
                    other => other,
                })?
            }
            TypeSpec::Regex(regex) => Matcher::pattern(regex.as_str())?,
            TypeSpec::AnyOf(names) => {
                if names.is_empty() {
                    return Err(RouteError::EmptyComposite(name.to_string()));
                }
                let alternatives = names
                    .iter()
                    .map(|n| self.lookup(n))
                    .collect::<Result<Vec<_>, _>>()?;
                Matcher::any_of(alternatives)
            }
            TypeSpec::Alias(target) => self.lookup(&target)?.as_ref().clone(),
        })
    }

    /// Look up a type by name. Unknown names are an error, never a fallback.
    pub fn lookup(&self, name: &str) -> Result<Arc<Matcher>, RouteError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| RouteError::UnknownVariableType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Transform a whole value with the named type.
    ///
    /// `Ok(None)` when the type does not match all of `value`; a client error
    /// when it fails and carries an error handler.
    pub fn transform(&self, name: &str, value: &str) -> Result<Option<Value>, Interrupt> {
        let matcher = self.lookup(name)?;
        Ok(matcher.attempt_whole(value)?.map(|capture| capture.value))
    }
}
