use crate::{
    db::{
        direction::Direction,
        predicate::{CompareOp, FilterSpec},
        query::RangeQuery,
        store::{ResumeCursor, StoreError},
    },
    error::InternalError,
    key::Key,
    model::PRIMARY_KEY_FIELD,
    value::Value,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::panic::{AssertUnwindSafe, catch_unwind};

const CURSOR_TOKEN_VERSION_V1: u8 = 1;
const MAX_CURSOR_TOKEN_BYTES: usize = 8 * 1024;
const SIGNATURE_DOMAIN_TAG: &[u8] = b"keyshard:cursor:v1";

///
/// ContinuationSignature
///
/// SHA-256 over the shape of one range query. Lower primary-key bounds are
/// left out so a reader can narrow its range past consumed rows and keep
/// using the same cursor.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ContinuationSignature([u8; 32]);

impl ContinuationSignature {
    pub(crate) fn for_query(query: &RangeQuery) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SIGNATURE_DOMAIN_TAG);

        write_str(&mut hasher, query.entity());
        match query.partition() {
            Some(partition) => {
                hasher.update([1u8]);
                write_str(&mut hasher, partition);
            }
            None => hasher.update([0u8]),
        }
        hasher.update([u8::from(query.is_keys_only())]);

        let filters: Vec<&FilterSpec> = query
            .filters()
            .iter()
            .filter(|filter| !is_lower_key_bound(filter))
            .collect();
        write_len(&mut hasher, filters.len());
        for filter in filters {
            write_str(&mut hasher, &filter.field);
            write_str(&mut hasher, filter.op.as_str());
            write_value(&mut hasher, &filter.value);
        }

        write_len(&mut hasher, query.order().len());
        for term in query.order() {
            write_str(&mut hasher, &term.field);
            hasher.update([direction_tag(term.direction)]);
        }

        Self(hasher.finalize().into())
    }

    const fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

///
/// CursorToken
/// Decoded resume cursor: query signature plus the last key returned.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct CursorToken {
    signature: ContinuationSignature,
    last_key: Key,
}

#[derive(Deserialize, Serialize)]
struct CursorTokenWire {
    version: u8,
    signature: [u8; 32],
    last_key: Key,
}

impl CursorToken {
    pub(crate) fn new(query: &RangeQuery, last_key: Key) -> Self {
        Self {
            signature: ContinuationSignature::for_query(query),
            last_key,
        }
    }

    pub(crate) fn encode(&self) -> Result<ResumeCursor, InternalError> {
        let wire = CursorTokenWire {
            version: CURSOR_TOKEN_VERSION_V1,
            signature: self.signature.into_bytes(),
            last_key: self.last_key.clone(),
        };

        serde_cbor::to_vec(&wire)
            .map(ResumeCursor::from_bytes)
            .map_err(|err| InternalError::serialize_internal(format!("cursor encode failed: {err}")))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() > MAX_CURSOR_TOKEN_BYTES {
            return Err(StoreError::invalid_cursor(
                "cursor exceeds maximum allowed size",
            ));
        }

        let wire: CursorTokenWire =
            match catch_unwind(AssertUnwindSafe(|| serde_cbor::from_slice(bytes))) {
                Ok(Ok(wire)) => wire,
                Ok(Err(err)) => return Err(StoreError::invalid_cursor(err.to_string())),
                Err(_) => {
                    return Err(StoreError::invalid_cursor(
                        "panic during cursor deserialization",
                    ));
                }
            };

        if wire.version != CURSOR_TOKEN_VERSION_V1 {
            return Err(StoreError::invalid_cursor(format!(
                "unsupported cursor version {}",
                wire.version
            )));
        }

        Ok(Self {
            signature: ContinuationSignature(wire.signature),
            last_key: wire.last_key,
        })
    }

    /// Decode `cursor` and check it was issued for `query`, returning the
    /// last key it covers.
    pub(crate) fn resume_after(
        cursor: &ResumeCursor,
        query: &RangeQuery,
    ) -> Result<Key, StoreError> {
        let token = Self::decode(cursor)?;
        if token.signature != ContinuationSignature::for_query(query) {
            return Err(StoreError::invalid_cursor(
                "cursor was issued for a different query",
            ));
        }

        Ok(token.last_key)
    }
}

fn is_lower_key_bound(filter: &FilterSpec) -> bool {
    filter.field == PRIMARY_KEY_FIELD && matches!(filter.op, CompareOp::Gt | CompareOp::Gte)
}

const fn direction_tag(direction: Direction) -> u8 {
    match direction {
        Direction::Asc => 0x01,
        Direction::Desc => 0x02,
    }
}

fn write_len(hasher: &mut Sha256, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    hasher.update(len.to_be_bytes());
}

fn write_str(hasher: &mut Sha256, value: &str) {
    write_len(hasher, value.len());
    hasher.update(value.as_bytes());
}

fn write_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0x00]),
        Value::Bool(v) => hasher.update([0x01, u8::from(*v)]),
        Value::Int(v) => {
            hasher.update([0x02]);
            hasher.update(v.to_be_bytes());
        }
        Value::Uint(v) => {
            hasher.update([0x03]);
            hasher.update(v.to_be_bytes());
        }
        Value::Text(v) => {
            hasher.update([0x04]);
            write_str(hasher, v);
        }
        Value::Key(v) => {
            hasher.update([0x05]);
            write_str(hasher, &v.to_string());
        }
        Value::List(items) => {
            hasher.update([0x06]);
            write_len(hasher, items.len());
            for item in items {
                write_value(hasher, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> RangeQuery {
        RangeQuery::new("tests::Entity", None)
            .keys_only(true)
            .filter(FilterSpec::eq("type", "C"))
    }

    #[test]
    fn token_bytes_decode_to_the_same_token() {
        let token = CursorToken::new(&query(), Key::Uint(4));
        let cursor = token.encode().expect("encode");

        assert_eq!(CursorToken::decode(&cursor).expect("decode"), token);
        assert_eq!(
            CursorToken::resume_after(&cursor, &query()).expect("same query"),
            Key::Uint(4)
        );
    }

    #[test]
    fn tightened_lower_bound_keeps_the_signature() {
        let narrowed = query().filter(FilterSpec::new(
            PRIMARY_KEY_FIELD,
            CompareOp::Gt,
            Key::Uint(2),
        ));

        assert_eq!(
            ContinuationSignature::for_query(&query()),
            ContinuationSignature::for_query(&narrowed)
        );
    }

    #[test]
    fn cursor_from_another_query_is_rejected() {
        let cursor = CursorToken::new(&query(), Key::Uint(4))
            .encode()
            .expect("encode");
        let other = query().filter(FilterSpec::new(
            PRIMARY_KEY_FIELD,
            CompareOp::Lt,
            Key::Uint(9),
        ));

        let err = CursorToken::resume_after(&cursor, &other).expect_err("shape differs");
        assert!(matches!(err, StoreError::InvalidCursor { .. }));
    }

    #[test]
    fn garbage_bytes_are_invalid_cursor() {
        let cursor = ResumeCursor::from_bytes(vec![0xff, 0x00, 0x13]);

        assert!(matches!(
            CursorToken::decode(&cursor),
            Err(StoreError::InvalidCursor { .. })
        ));
    }
}
