//! Key-range sharding for map-reduce inputs: split an ordered collection
//! into disjoint primary-key ranges, then stream each shard with resumable,
//! serializable readers.

// public exports are one module level down
pub mod db;
pub mod error;
pub mod key;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, stores, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{Direction, FilterSpec, JobSpec, KeyRange, Record, ShardReader, ShardSplitter},
        key::Key,
        model::{EntityModel, FieldKind, FieldModel},
        value::Value,
    };
}
