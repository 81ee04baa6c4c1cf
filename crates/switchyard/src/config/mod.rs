//! Configuration types for Switchyard.
//!
//! - [`Settings`]: the settings object, including variable type declarations
//!   applied onto a [`VariableTypes`] registry;
//! - [`routes`]: declarative route tables compiled through the same builder
//!   as routes declared in code.

pub mod routes;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::RouteError;
use crate::matcher::{TypeSpec, VariableTypes};

pub use routes::{OpEntry, QueryEntry, QueryFieldEntry, ResponseEntry, RouteEntry, RouteFile};

/// Errors raised while loading settings or route tables.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid variable type '{name}': {reason}")]
    InvalidVariableType { name: String, reason: String },
    #[error("Invalid route '{op}': {reason}")]
    InvalidRoute { op: String, reason: String },
    #[error(transparent)]
    Route(#[from] RouteError),
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

/// The settings object read by the router.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Informational; reported as the charset of text responses.
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Variable types, applied in order on top of the built-in `integer`
    /// and `int`. Later entries may refer to earlier ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_types: Vec<TypeDecl>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_encoding: default_encoding(),
            variable_types: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = read_file(path.as_ref())?;
        Settings::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(contents)?;
        Ok(settings)
    }

    /// Build the registry these settings describe. Every pattern and
    /// referenced name is checked here.
    pub fn into_registry(self) -> Result<VariableTypes, ConfigError> {
        let mut types = VariableTypes::new();
        for decl in &self.variable_types {
            decl.apply(&mut types)?;
        }
        Ok(types)
    }
}

/// A variable type declaration.
///
/// ```yaml
/// variable_types:
///   - name: hex
///     pattern: "0x[0-9a-fA-F]+"
///     transform: hex
///   - name: number
///     any_of: [hex, integer]
///   - name: symbol
///     pattern: "[a-z_]+"
///     on_error: 422
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeDecl {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformKind>,

    /// Response for values this type fails to match. Without it a failed
    /// match is silent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<ResponseEntry>,
}

impl TypeDecl {
    fn spec(&self) -> Result<TypeSpec, ConfigError> {
        match (&self.pattern, &self.any_of, &self.alias) {
            (Some(pattern), None, None) => Ok(TypeSpec::Pattern(pattern.clone())),
            (None, Some(names), None) => Ok(TypeSpec::AnyOf(names.clone())),
            (None, None, Some(target)) => Ok(TypeSpec::Alias(target.clone())),
            _ => Err(ConfigError::InvalidVariableType {
                name: self.name.clone(),
                reason: "exactly one of 'pattern', 'any_of' or 'alias' is required".to_string(),
            }),
        }
    }

    fn apply(&self, types: &mut VariableTypes) -> Result<(), ConfigError> {
        let mut matcher = types.resolve(&self.name, self.spec()?)?;
        if let Some(kind) = self.transform {
            matcher = matcher.on_transform(move |text| kind.apply(text));
        }
        if let Some(entry) = &self.on_error {
            matcher = matcher.raise_on_error(entry.to_response()?);
        }
        types.register(&self.name, matcher)?;
        Ok(())
    }
}

/// Built-in value transforms for declared types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Integer,
    Float,
    Boolean,
    Lowercase,
    Uppercase,
    /// Hexadecimal with an optional `0x` prefix.
    Hex,
}

impl TransformKind {
    /// `None` when `text` cannot be converted.
    pub fn apply(self, text: &str) -> Option<Value> {
        match self {
            TransformKind::Integer => text.parse::<i64>().ok().map(Value::from),
            TransformKind::Float => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            TransformKind::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            TransformKind::Lowercase => Some(Value::String(text.to_lowercase())),
            TransformKind::Uppercase => Some(Value::String(text.to_uppercase())),
            TransformKind::Hex => {
                let digits = text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .unwrap_or(text);
                i64::from_str_radix(digits, 16).ok().map(Value::from)
            }
        }
    }
}
