//! Pre-map predicate filters.
//!
//! A filter factory is registered under a name at process startup. Readers
//! carry only a [`FilterFactorySpec`] (name plus arguments); every process
//! that deserializes a reader rebuilds the predicate locally from the spec.

use crate::{
    db::{
        predicate::{CompareOp, FilterSpec, eval_filter},
        record::Record,
        registry::RegistryError,
    },
    error::InternalError,
    key::Key,
    value::Value,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::{collections::HashMap, fmt, sync::Arc};
use thiserror::Error as ThisError;

/// Resolved record predicate produced by a filter factory.
pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

type FilterFactory =
    Arc<dyn Fn(&FilterArgs<'_>) -> Result<RecordPredicate, FilterArgError> + Send + Sync>;

///
/// FilterFactorySpec
///
/// Serializable construction spec for one predicate filter:
/// `{ "name": ..., "args": [...], "kwargs": {...} }`.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilterFactorySpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<JsonValue>,
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
}

impl FilterFactorySpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.args.push(value.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// An empty spec names no factory and attaches nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

///
/// FilterArgError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{0}")]
pub struct FilterArgError(String);

impl FilterArgError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

///
/// FilterArgs
///
/// Borrowed view over a spec's arguments.
/// A parameter is looked up positionally first, then by name.
///

#[derive(Clone, Copy, Debug)]
pub struct FilterArgs<'a> {
    args: &'a [JsonValue],
    kwargs: &'a Map<String, JsonValue>,
}

impl<'a> FilterArgs<'a> {
    #[must_use]
    pub const fn new(args: &'a [JsonValue], kwargs: &'a Map<String, JsonValue>) -> Self {
        Self { args, kwargs }
    }

    #[must_use]
    pub fn get(&self, index: usize, name: &str) -> Option<&'a JsonValue> {
        self.args.get(index).or_else(|| self.kwargs.get(name))
    }

    pub fn required(&self, index: usize, name: &str) -> Result<&'a JsonValue, FilterArgError> {
        self.get(index, name)
            .ok_or_else(|| FilterArgError::new(format!("missing argument '{name}' (#{index})")))
    }

    pub fn text(&self, index: usize, name: &str) -> Result<&'a str, FilterArgError> {
        self.required(index, name)?
            .as_str()
            .ok_or_else(|| FilterArgError::new(format!("argument '{name}' must be a string")))
    }

    pub fn value(&self, index: usize, name: &str) -> Result<Value, FilterArgError> {
        let raw = self.required(index, name)?;

        serde_json::from_value(raw.clone())
            .map_err(|err| FilterArgError::new(format!("argument '{name}': {err}")))
    }
}

///
/// FilterRegistry
///
/// Predicate factory resolver: maps factory names to constructors.
/// Resolution has no side effects, so it is safe to repeat on every
/// deserialization.
///

#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: HashMap<String, FilterFactory>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();

        f.debug_struct("FilterRegistry")
            .field("factories", &names)
            .finish()
    }
}

impl FilterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in factories.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, factory) in builtin_factories() {
            registry.factories.insert(name.to_string(), factory);
        }

        registry
    }

    /// Register one named factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), InternalError>
    where
        F: Fn(&FilterArgs<'_>) -> Result<RecordPredicate, FilterArgError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::FactoryAlreadyRegistered(name).into());
        }

        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Resolve a spec into its predicate by invoking the named factory.
    pub fn resolve(&self, spec: &FilterFactorySpec) -> Result<RecordPredicate, RegistryError> {
        let factory = self
            .factories
            .get(&spec.name)
            .ok_or_else(|| RegistryError::UnresolvedPredicateFactory(spec.name.clone()))?;

        factory(&FilterArgs::new(&spec.args, &spec.kwargs)).map_err(|err| {
            RegistryError::InvalidFactoryArgs {
                name: spec.name.clone(),
                reason: err.to_string(),
            }
        })
    }
}

///
/// BUILTINS
///

pub const FIELD_EQUALS: &str = "field_equals";
pub const FIELD_IN: &str = "field_in";
pub const TEXT_PREFIX: &str = "text_prefix";

fn builtin_factories() -> [(&'static str, FilterFactory); 3] {
    [
        (FIELD_EQUALS, Arc::new(field_equals) as FilterFactory),
        (FIELD_IN, Arc::new(field_in) as FilterFactory),
        (TEXT_PREFIX, Arc::new(text_prefix) as FilterFactory),
    ]
}

// field_equals(field, value)
fn field_equals(args: &FilterArgs<'_>) -> Result<RecordPredicate, FilterArgError> {
    let filter = FilterSpec::new(args.text(0, "field")?, CompareOp::Eq, args.value(1, "value")?);

    Ok(reference_aware(filter))
}

// field_in(field, [values])
fn field_in(args: &FilterArgs<'_>) -> Result<RecordPredicate, FilterArgError> {
    let values = args.value(1, "values")?;
    if values.as_list().is_none() {
        return Err(FilterArgError::new("argument 'values' must be a list"));
    }
    let filter = FilterSpec::new(args.text(0, "field")?, CompareOp::In, values);

    Ok(reference_aware(filter))
}

// Arguments arrive as JSON, so key references arrive as canonical text.
// Rows whose field holds a key are compared against the parsed key instead.
fn reference_aware(filter: FilterSpec) -> RecordPredicate {
    let keyed = FilterSpec {
        value: key_literal(&filter.value),
        ..filter.clone()
    };

    Arc::new(move |record: &Record| match record.get(&filter.field) {
        Some(Value::Key(_)) => eval_filter(record, &keyed),
        _ => eval_filter(record, &filter),
    })
}

fn key_literal(value: &Value) -> Value {
    match value {
        Value::Text(text) => text
            .parse::<Key>()
            .map_or_else(|_| value.clone(), Value::Key),
        Value::List(items) => Value::List(items.iter().map(key_literal).collect()),
        other => other.clone(),
    }
}

// text_prefix(field, prefix)
fn text_prefix(args: &FilterArgs<'_>) -> Result<RecordPredicate, FilterArgError> {
    let field = args.text(0, "field")?.to_string();
    let prefix = args.text(1, "prefix")?.to_string();

    let predicate: RecordPredicate = Arc::new(move |record: &Record| {
        record
            .get(&field)
            .and_then(Value::as_text)
            .is_some_and(|text| text.starts_with(prefix.as_str()))
    });

    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use serde_json::json;

    fn row(kind: &str, name: &str) -> Record {
        Record::from_pairs(Key::Uint(1), [("type", kind), ("name", name)])
    }

    #[test]
    fn builtins_resolve_from_positional_or_named_args() {
        let registry = FilterRegistry::with_builtins();

        let positional = registry
            .resolve(&FilterFactorySpec::new(FIELD_EQUALS).arg("type").arg("B"))
            .expect("positional args should resolve");
        let named = registry
            .resolve(
                &FilterFactorySpec::new(FIELD_EQUALS)
                    .kwarg("field", "type")
                    .kwarg("value", "B"),
            )
            .expect("named args should resolve");

        for predicate in [positional, named] {
            assert!(predicate(&row("B", "name1")));
            assert!(!predicate(&row("C", "name1")));
        }
    }

    #[test]
    fn key_text_matches_reference_fields_by_key() {
        let registry = FilterRegistry::with_builtins();
        let owned = |owner: Value| Record::from_pairs(Key::Uint(7), [("owner", owner)]);

        let equals = registry
            .resolve(&FilterFactorySpec::new(FIELD_EQUALS).arg("owner").arg("uint:1"))
            .expect("field_equals should resolve");
        let within = registry
            .resolve(
                &FilterFactorySpec::new(FIELD_IN)
                    .arg("owner")
                    .arg(json!(["uint:3", "uint:1"])),
            )
            .expect("field_in should resolve");

        assert!(equals(&owned(Value::Key(Key::Uint(1)))));
        assert!(!equals(&owned(Value::Key(Key::Uint(2)))));
        assert!(within(&owned(Value::Key(Key::Uint(1)))));
        assert!(!within(&owned(Value::Key(Key::Uint(2)))));

        // Plain text fields still compare as text.
        assert!(equals(&owned(Value::text("uint:1"))));
    }

    #[test]
    fn field_in_and_text_prefix_builtins_filter_rows() {
        let registry = FilterRegistry::with_builtins();
        let field_in = registry
            .resolve(&FilterFactorySpec::new(FIELD_IN).arg("type").arg(json!(["A", "C"])))
            .expect("field_in should resolve");
        let prefix = registry
            .resolve(&FilterFactorySpec::new(TEXT_PREFIX).arg("name").arg("na"))
            .expect("text_prefix should resolve");

        assert!(field_in(&row("C", "x")));
        assert!(!field_in(&row("B", "x")));
        assert!(prefix(&row("B", "name2")));
        assert!(!prefix(&row("B", "other")));
    }

    #[test]
    fn unknown_factory_name_is_unresolved() {
        let registry = FilterRegistry::with_builtins();
        let err = registry
            .resolve(&FilterFactorySpec::new("nope::factory"))
            .err()
            .expect("unknown factory should fail");

        assert_eq!(
            err,
            RegistryError::UnresolvedPredicateFactory("nope::factory".to_string())
        );
    }

    #[test]
    fn bad_arguments_are_reported_with_factory_name() {
        let registry = FilterRegistry::with_builtins();
        let err = registry
            .resolve(&FilterFactorySpec::new(FIELD_IN).arg("type").arg("A"))
            .err()
            .expect("scalar values should be rejected");

        assert!(matches!(
            err,
            RegistryError::InvalidFactoryArgs { ref name, .. } if name == FIELD_IN
        ));
    }

    #[test]
    fn custom_factory_registration_rejects_duplicates() {
        let mut registry = FilterRegistry::new();
        registry
            .register("tests::always", |_: &FilterArgs<'_>| {
                Ok(Arc::new(|_: &Record| true) as RecordPredicate)
            })
            .expect("first registration should succeed");

        let err = registry
            .register("tests::always", |_: &FilterArgs<'_>| {
                Ok(Arc::new(|_: &Record| false) as RecordPredicate)
            })
            .expect_err("duplicate registration should fail");
        assert!(err.message.contains("already registered"));
        assert!(registry.contains("tests::always"));
    }
}
