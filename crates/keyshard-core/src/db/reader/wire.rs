use crate::{
    db::{
        filter::FilterFactorySpec,
        predicate::FilterSpec,
        range::{KeyRange, KeyRangeError, NamespaceRange},
        reader::{PreMapFilter, ShardReader},
        store::ResumeCursor,
    },
    error::InternalError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

///
/// ShardReaderWire
///
/// JSON shape of one reader. Ranges stay as raw JSON values here and are
/// decoded one by one, so a malformed range surfaces as `InvalidKeyRange`
/// with its position.
///

#[derive(Deserialize, Serialize)]
struct ShardReaderWire {
    entity_kind: String,
    #[serde(default)]
    key_ranges: Option<Vec<JsonValue>>,
    #[serde(default)]
    namespace_range: Option<NamespaceRange>,
    #[serde(default)]
    current_key_range: Option<JsonValue>,
    batch_size: usize,
    #[serde(default)]
    filters: Vec<FilterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter_factory_spec: Option<FilterFactorySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resume_cursor: Option<ResumeCursor>,
}

pub(super) fn encode(reader: &ShardReader) -> Result<JsonValue, InternalError> {
    let key_ranges = reader
        .key_ranges
        .as_ref()
        .map(|slots| {
            slots
                .iter()
                .map(|slot| slot.as_ref().map_or(Ok(JsonValue::Null), encode_range))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let current_key_range = reader
        .current_key_range
        .as_ref()
        .map(encode_range)
        .transpose()?;

    let wire = ShardReaderWire {
        entity_kind: reader.entity_kind.clone(),
        key_ranges,
        namespace_range: reader.namespace_range.clone(),
        current_key_range,
        batch_size: reader.batch_size,
        filters: reader.filters.clone(),
        filter_factory_spec: reader.filter_factory_spec.clone(),
        resume_cursor: reader.resume_cursor.clone(),
    };

    serde_json::to_value(wire).map_err(|err| {
        InternalError::serialize_internal(format!("shard reader encode failed: {err}"))
    })
}

// Base fields only; the predicate filter is injected by the caller.
pub(super) fn decode(value: &JsonValue) -> Result<ShardReader, InternalError> {
    let wire: ShardReaderWire = serde_json::from_value(value.clone()).map_err(|err| {
        InternalError::reader_corruption(format!("malformed shard reader: {err}"))
    })?;

    if wire.batch_size == 0 {
        return Err(InternalError::reader_corruption(
            "malformed shard reader: batch_size must be at least 1",
        ));
    }
    if let Some(namespaces) = &wire.namespace_range {
        namespaces.validate()?;
    }

    let key_ranges = wire
        .key_ranges
        .map(|slots| {
            slots
                .into_iter()
                .enumerate()
                .map(|(index, slot)| decode_slot(slot, &format!("key_ranges[{index}]")))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let current_key_range = wire
        .current_key_range
        .map(|slot| decode_slot(slot, "current_key_range"))
        .transpose()?
        .flatten();

    Ok(ShardReader {
        entity_kind: wire.entity_kind,
        key_ranges,
        namespace_range: wire.namespace_range,
        current_key_range,
        batch_size: wire.batch_size,
        filters: wire.filters,
        filter_factory_spec: wire.filter_factory_spec,
        filter: PreMapFilter::None,
        resume_cursor: wire.resume_cursor,
    })
}

fn encode_range(range: &KeyRange) -> Result<JsonValue, InternalError> {
    serde_json::to_value(range).map_err(|err| {
        InternalError::serialize_internal(format!("key range encode failed: {err}"))
    })
}

fn decode_slot(slot: JsonValue, position: &str) -> Result<Option<KeyRange>, InternalError> {
    if slot.is_null() {
        return Ok(None);
    }

    KeyRange::from_json_value(slot).map(Some).map_err(|err| {
        if let Some(KeyRangeError::InvalidKeyRange { reason }) = err.as_key_range_error() {
            return KeyRangeError::invalid(format!("{position}: {reason}")).into();
        }
        err
    })
}
