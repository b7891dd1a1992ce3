mod eval;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub(crate) use eval::{eval_all, eval_filter};

///
/// CompareOp
///
/// Comparison operators accepted in `(field, op, value)` filter triples.
/// Text forms follow the store's query syntax: `=`, `!=`, `<`, `<=`, `>`,
/// `>=`, `IN`, `NOT IN`.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
}

impl CompareOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PredicateError> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            _ => Err(PredicateError::UnknownOperator(raw.to_string())),
        }
    }

    /// Whether the literal for this operator is a list of candidates.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

///
/// PredicateError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PredicateError {
    #[error("unknown filter operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{op}' expects a list literal")]
    ExpectedList { op: CompareOp },
}

///
/// FilterSpec
///
/// One `(field, op, value)` constraint the store evaluates natively.
/// Serialized as a three-element array, e.g. `["type", "=", "C"]`.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "FilterSpecWire", into = "FilterSpecWire")]
pub struct FilterSpec {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl FilterSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, CompareOp::Eq, value)
    }

    #[must_use]
    pub fn in_(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, CompareOp::In, Value::List(values))
    }
}

#[derive(Deserialize, Serialize)]
struct FilterSpecWire(String, String, Value);

impl TryFrom<FilterSpecWire> for FilterSpec {
    type Error = PredicateError;

    fn try_from(FilterSpecWire(field, op, value): FilterSpecWire) -> Result<Self, Self::Error> {
        let op = CompareOp::parse(&op)?;
        if op.takes_list() && value.as_list().is_none() {
            return Err(PredicateError::ExpectedList { op });
        }

        Ok(Self { field, op, value })
    }
}

impl From<FilterSpec> for FilterSpecWire {
    fn from(spec: FilterSpec) -> Self {
        Self(spec.field, spec.op.as_str().to_string(), spec.value)
    }
}
