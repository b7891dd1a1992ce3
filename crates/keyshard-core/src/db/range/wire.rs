use crate::{
    db::{
        direction::Direction,
        range::{KeyRange, KeyRangeError},
    },
    key::Key,
};
use serde::{Deserialize, Serialize};

///
/// KeyRangeWire
///
/// JSON shape of one key range. `direction` is required; null bounds and a
/// null namespace are accepted. The `_app` slot is kept for documents
/// written by application-scoped producers.
///

#[derive(Deserialize, Serialize)]
pub(crate) struct KeyRangeWire {
    pub key_start: Option<Key>,
    pub key_end: Option<Key>,
    pub direction: Direction,
    pub include_start: bool,
    pub include_end: bool,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default, rename = "_app")]
    pub app: Option<String>,
}

impl From<KeyRange> for KeyRangeWire {
    fn from(range: KeyRange) -> Self {
        Self {
            key_start: range.start_key,
            key_end: range.end_key,
            direction: range.direction,
            include_start: range.include_start,
            include_end: range.include_end,
            namespace: range.partition,
            app: range.app,
        }
    }
}

impl TryFrom<KeyRangeWire> for KeyRange {
    type Error = KeyRangeError;

    fn try_from(wire: KeyRangeWire) -> Result<Self, Self::Error> {
        let range = Self {
            start_key: wire.key_start,
            end_key: wire.key_end,
            direction: wire.direction,
            include_start: wire.include_start,
            include_end: wire.include_end,
            partition: wire.namespace,
            app: wire.app,
        };
        range.validate()?;

        Ok(range)
    }
}
