//! Codec parameters and their validation.
//!
//! A [`CodecConfig`] is an immutable name → scalar map bound to one codec at
//! construction. Each codec publishes its accepted parameters as a list of
//! [`ParamSpec`]s; [`validate`] checks a config against that list once, so
//! the encode/decode hot path never re-checks parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A scalar codec parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Parameters bound to a codec instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecConfig {
    params: BTreeMap<String, ParamValue>,
}

impl CodecConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the config with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Integer parameter, or `default` when absent.
    ///
    /// Call after [`validate`]; a present value of another kind also yields
    /// `default`.
    pub fn int_or(&self, name: &str, default: i64) -> i64 {
        self.get(name).and_then(ParamValue::as_int).unwrap_or(default)
    }

    /// Float parameter, or `default` when absent.
    pub fn float_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(ParamValue::as_float).unwrap_or(default)
    }

    /// Bool parameter, or `default` when absent.
    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(ParamValue::as_bool).unwrap_or(default)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for CodecConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CodecConfig {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Kind of a codec parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    Str,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
        }
    }

    fn accepts(self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamKind::Float, ParamValue::Int(_)) => true,
            (kind, value) => kind == value.kind(),
        }
    }
}

/// Declaration of one accepted codec parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ParamSpec {
    /// Optional parameter of the given kind.
    pub const fn new(name: &'static str, kind: ParamKind) -> Self {
        ParamSpec {
            name,
            kind,
            required: false,
            min: None,
            max: None,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self::new(name, ParamKind::Int)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ParamKind::Float)
    }

    pub const fn bool(name: &'static str) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ParamKind::Str)
    }

    /// Mark the parameter as required.
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restrict a numeric parameter to `[min, max]` (inclusive).
    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    fn check(&self, codec: &str, value: &ParamValue) -> Result<()> {
        if !self.kind.accepts(value) {
            return Err(Error::invalid_config(
                codec,
                format!(
                    "parameter '{}' must be {}, got {}",
                    self.name,
                    self.kind.name(),
                    value.kind().name()
                ),
            ));
        }

        if let Some(v) = value.as_number() {
            let below = self.min.is_some_and(|min| v < min);
            let above = self.max.is_some_and(|max| v > max);
            if below || above {
                return Err(Error::invalid_config(
                    codec,
                    format!(
                        "parameter '{}' = {} out of range [{}, {}]",
                        self.name,
                        value,
                        self.min.map_or("-inf".to_string(), |m| m.to_string()),
                        self.max.map_or("inf".to_string(), |m| m.to_string()),
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Check `config` against the parameters a codec accepts.
///
/// Fails with `InvalidConfig` when a required parameter is missing, a value
/// has the wrong kind or lies outside its range, or the config names a
/// parameter the codec does not know.
pub fn validate(codec: &str, specs: &[ParamSpec], config: &CodecConfig) -> Result<()> {
    for (name, _) in config.iter() {
        if !specs.iter().any(|s| s.name == name) {
            let known: Vec<&str> = specs.iter().map(|s| s.name).collect();
            return Err(Error::invalid_config(
                codec,
                format!("unknown parameter '{}' (accepted: {:?})", name, known),
            ));
        }
    }

    for spec in specs {
        match config.get(spec.name) {
            Some(value) => spec.check(codec, value)?,
            None if spec.required => {
                return Err(Error::invalid_config(
                    codec,
                    format!("missing required parameter '{}'", spec.name),
                ));
            }
            None => {}
        }
    }

    Ok(())
}
