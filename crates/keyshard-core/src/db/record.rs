use crate::{key::Key, model::PRIMARY_KEY_FIELD, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Record
///
/// One stored row: its primary key plus named field values.
/// Keys-only projections carry an empty field map.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Record {
    key: Key,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub const fn new(key: Key, fields: BTreeMap<String, Value>) -> Self {
        Self { key, fields }
    }

    /// Build a keys-only projection row.
    #[must_use]
    pub const fn key_only(key: Key) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Build a record from `(field, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, N, V>(key: Key, pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        let fields = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();

        Self { key, fields }
    }

    #[must_use]
    pub const fn key(&self) -> &Key {
        &self.key
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Read one field; `__key__` resolves to the primary key.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == PRIMARY_KEY_FIELD {
            return Some(Value::Key(self.key.clone()));
        }

        self.fields.get(name).cloned()
    }

    /// Borrow one stored field without primary-key resolution.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn into_parts(self) -> (Key, BTreeMap<String, Value>) {
        (self.key, self.fields)
    }
}
