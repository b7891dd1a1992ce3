mod namespace;
mod wire;


use crate::{
    db::{
        direction::Direction,
        predicate::{CompareOp, FilterSpec},
        query::{OrderTerm, RangeQuery, bounds_are_empty},
    },
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
    key::Key,
    model::{EntityModel, PRIMARY_KEY_FIELD},
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use thiserror::Error as ThisError;

pub use namespace::NamespaceRange;
pub(crate) use wire::KeyRangeWire;

///
/// KeyRangeError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum KeyRangeError {
    #[error("invalid key range: {reason}")]
    InvalidKeyRange { reason: String },

    #[error("filter on '{field}' has value '{value}' that is not a valid key reference")]
    InvalidKeyReference { field: String, value: String },

    #[error("unsupported range operation: {reason}")]
    UnsupportedOperation { reason: String },

    #[error("entity '{entity}' has no field '{field}'")]
    UnknownField { entity: String, field: String },
}

impl KeyRangeError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidKeyRange {
            reason: reason.into(),
        }
    }

    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidKeyRange { .. } => ErrorClass::Corruption,
            Self::InvalidKeyReference { .. } | Self::UnsupportedOperation { .. } => {
                ErrorClass::Unsupported
            }
            Self::UnknownField { .. } => ErrorClass::NotFound,
        }
    }
}

impl From<KeyRangeError> for InternalError {
    fn from(err: KeyRangeError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Range,
            err.to_string(),
            ErrorDetail::Range(err),
        )
    }
}

///
/// KeyRange
///
/// Contiguous interval over ordered primary keys.
///
/// An absent bound means unbounded on that side, and its inclusivity flag
/// is carried but ignored. Ranges are immutable: scan progress produces a
/// replacement range via [`KeyRange::advance_past`].
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(try_from = "KeyRangeWire", into = "KeyRangeWire")]
pub struct KeyRange {
    start_key: Option<Key>,
    end_key: Option<Key>,
    direction: Direction,
    include_start: bool,
    include_end: bool,
    partition: Option<String>,
    app: Option<String>,
}

impl Default for KeyRange {
    fn default() -> Self {
        Self {
            start_key: None,
            end_key: None,
            direction: Direction::Asc,
            include_start: true,
            include_end: true,
            partition: None,
            app: None,
        }
    }
}

impl KeyRange {
    /// Build a range, rejecting `start_key > end_key`.
    pub fn new(
        start_key: Option<Key>,
        end_key: Option<Key>,
        include_start: bool,
        include_end: bool,
    ) -> Result<Self, InternalError> {
        let range = Self {
            start_key,
            end_key,
            include_start,
            include_end,
            ..Self::default()
        };
        range.validate()?;

        Ok(range)
    }

    /// Range covering every key of one partition.
    #[must_use]
    pub fn unbounded(partition: Option<String>) -> Self {
        Self {
            partition,
            ..Self::default()
        }
    }

    /// Half-open `[start, end)` range used for split boundaries.
    pub(crate) fn half_open(start: Key, end: Option<Key>) -> Self {
        Self {
            start_key: Some(start),
            end_key: end,
            include_end: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_partition(mut self, partition: Option<String>) -> Self {
        self.partition = partition;
        self
    }

    #[must_use]
    pub fn with_app(mut self, app: Option<String>) -> Self {
        self.app = app;
        self
    }

    #[must_use]
    pub const fn start_key(&self) -> Option<&Key> {
        self.start_key.as_ref()
    }

    #[must_use]
    pub const fn end_key(&self) -> Option<&Key> {
        self.end_key.as_ref()
    }

    #[must_use]
    pub const fn include_start(&self) -> bool {
        self.include_start
    }

    #[must_use]
    pub const fn include_end(&self) -> bool {
        self.include_end
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    #[must_use]
    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    /// Lower bound as a standard range bound.
    #[must_use]
    pub fn lower_bound(&self) -> Bound<&Key> {
        match &self.start_key {
            Some(key) if self.include_start => Bound::Included(key),
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        }
    }

    /// Upper bound as a standard range bound.
    #[must_use]
    pub fn upper_bound(&self) -> Bound<&Key> {
        match &self.end_key {
            Some(key) if self.include_end => Bound::Included(key),
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        }
    }

    /// Whether no key can fall inside this range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        bounds_are_empty(&self.lower_bound().cloned(), &self.upper_bound().cloned())
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        let above = match self.lower_bound() {
            Bound::Included(start) => key >= start,
            Bound::Excluded(start) => key > start,
            Bound::Unbounded => true,
        };
        let below = match self.upper_bound() {
            Bound::Included(end) => key <= end,
            Bound::Excluded(end) => key < end,
            Bound::Unbounded => true,
        };

        above && below
    }

    /// Whether two ranges in the same partition share any key.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.partition != other.partition || self.is_empty() || other.is_empty() {
            return false;
        }

        !ends_before(self.upper_bound(), other.lower_bound())
            && !ends_before(other.upper_bound(), self.lower_bound())
    }

    /// Replacement range that starts strictly after `key`.
    #[must_use]
    pub fn advance_past(&self, key: &Key) -> Self {
        Self {
            start_key: Some(key.clone()),
            include_start: false,
            ..self.clone()
        }
    }

    /// Build an ordered range query over `model`.
    ///
    /// Explicit filters are applied first, the range's own bounds last, then
    /// the order terms.
    pub fn make_query(
        &self,
        model: &EntityModel,
        keys_only: bool,
        filters: &[FilterSpec],
        order: &[OrderTerm],
    ) -> Result<RangeQuery, InternalError> {
        if let Some(app) = &self.app {
            return Err(KeyRangeError::UnsupportedOperation {
                reason: format!("queries scoped to application '{app}' are not supported"),
            }
            .into());
        }

        let query = RangeQuery::new(model.path(), self.partition.clone()).keys_only(keys_only);
        let mut query = self.filter_query(model, query, filters)?;
        for term in order {
            if model.field_kind(&term.field).is_none() {
                return Err(unknown_field(model, &term.field).into());
            }
            query = query.order_by(term.clone());
        }

        Ok(query)
    }

    /// [`Self::make_query`] ordered by ascending primary key.
    pub fn make_ascending_query(
        &self,
        model: &EntityModel,
        keys_only: bool,
        filters: &[FilterSpec],
    ) -> Result<RangeQuery, InternalError> {
        self.make_query(
            model,
            keys_only,
            filters,
            &[OrderTerm::primary_key(Direction::Asc)],
        )
    }

    /// [`Self::make_query`] ordered by primary key in this range's direction.
    pub fn make_directed_query(
        &self,
        model: &EntityModel,
        keys_only: bool,
        filters: &[FilterSpec],
    ) -> Result<RangeQuery, InternalError> {
        self.make_query(
            model,
            keys_only,
            filters,
            &[OrderTerm::primary_key(self.direction)],
        )
    }

    /// Append `filters` and then this range's bounds to `query`.
    ///
    /// Text values aimed at reference-typed fields are resolved into keys.
    pub fn filter_query(
        &self,
        model: &EntityModel,
        mut query: RangeQuery,
        filters: &[FilterSpec],
    ) -> Result<RangeQuery, InternalError> {
        for filter in filters {
            query = query.filter(resolve_filter(model, filter)?);
        }

        if let Some(start) = &self.start_key {
            let op = if self.include_start {
                CompareOp::Gte
            } else {
                CompareOp::Gt
            };
            query = query.filter(FilterSpec::new(PRIMARY_KEY_FIELD, op, start.clone()));
        }
        if let Some(end) = &self.end_key {
            let op = if self.include_end {
                CompareOp::Lte
            } else {
                CompareOp::Lt
            };
            query = query.filter(FilterSpec::new(PRIMARY_KEY_FIELD, op, end.clone()));
        }

        Ok(query)
    }

    /// Serialize to a JSON document.
    pub fn to_json(&self) -> Result<String, InternalError> {
        serde_json::to_string(self).map_err(|err| {
            InternalError::serialize_internal(format!("key range encode failed: {err}"))
        })
    }

    /// Deserialize from a JSON document produced by [`Self::to_json`].
    pub fn from_json(raw: &str) -> Result<Self, InternalError> {
        let wire: KeyRangeWire = serde_json::from_str(raw)
            .map_err(|err| KeyRangeError::invalid(format!("malformed key range: {err}")))?;

        Ok(Self::try_from(wire)?)
    }

    /// Deserialize from an already-parsed JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, InternalError> {
        let wire: KeyRangeWire = serde_json::from_value(value)
            .map_err(|err| KeyRangeError::invalid(format!("malformed key range: {err}")))?;

        Ok(Self::try_from(wire)?)
    }

    fn validate(&self) -> Result<(), KeyRangeError> {
        if let (Some(start), Some(end)) = (&self.start_key, &self.end_key)
            && start > end
        {
            return Err(KeyRangeError::invalid(format!(
                "start key {start} is after end key {end}"
            )));
        }

        Ok(())
    }
}

// Whether every key under `upper` sorts before every key above `lower`.
fn ends_before(upper: Bound<&Key>, lower: Bound<&Key>) -> bool {
    match (upper, lower) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
        (Bound::Included(end), Bound::Included(start)) => end < start,
        (Bound::Included(end) | Bound::Excluded(end), Bound::Excluded(start))
        | (Bound::Excluded(end), Bound::Included(start)) => end <= start,
    }
}

fn unknown_field(model: &EntityModel, field: &str) -> KeyRangeError {
    KeyRangeError::UnknownField {
        entity: model.path().to_string(),
        field: field.to_string(),
    }
}

// Resolve text literals on reference-typed fields into native keys.
fn resolve_filter(model: &EntityModel, filter: &FilterSpec) -> Result<FilterSpec, KeyRangeError> {
    let kind = model
        .field_kind(&filter.field)
        .ok_or_else(|| unknown_field(model, &filter.field))?;
    if !kind.is_reference() {
        return Ok(filter.clone());
    }

    let value = match &filter.value {
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|item| resolve_reference(&filter.field, item))
                .collect::<Result<_, _>>()?,
        ),
        other => resolve_reference(&filter.field, other)?,
    };

    Ok(FilterSpec {
        value,
        ..filter.clone()
    })
}

fn resolve_reference(field: &str, value: &Value) -> Result<Value, KeyRangeError> {
    match value {
        Value::Text(raw) => raw.parse::<Key>().map(Value::Key).map_err(|_| {
            KeyRangeError::InvalidKeyReference {
                field: field.to_string(),
                value: raw.clone(),
            }
        }),
        other => Ok(other.clone()),
    }
}
