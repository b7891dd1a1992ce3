//! Shared fixtures: one six-row collection with three record types.

use crate::{
    db::{Catalog, MemoryStore, Record},
    key::Key,
    model::{EntityModel, FieldKind, FieldModel},
    value::Value,
};

pub(crate) const TEST_ENTITY: &str = "tests::TestEntity";
pub(crate) const OWNER_FIELD: &str = "owner";

// (type, name) per row; keys are uint:1 ..= uint:6 in this order.
const ROWS: [(&str, &str); 6] = [
    ("A", "name1"),
    ("B", "name1"),
    ("B", "name2"),
    ("C", "name1"),
    ("C", "name2"),
    ("C", "name3"),
];

pub(crate) const fn uint(value: u64) -> Key {
    Key::Uint(value)
}

pub(crate) fn test_model() -> EntityModel {
    EntityModel::new(
        TEST_ENTITY,
        vec![
            FieldModel::new("type", FieldKind::Text),
            FieldModel::new("name", FieldKind::Text),
            FieldModel::new("value", FieldKind::Text),
            FieldModel::new(
                OWNER_FIELD,
                FieldKind::Reference {
                    target: TEST_ENTITY.to_string(),
                },
            ),
        ],
    )
}

pub(crate) fn test_records() -> Vec<Record> {
    (1u64..)
        .zip(ROWS)
        .map(|(key, (kind, name))| {
            Record::from_pairs(
                uint(key),
                [
                    ("type", Value::text(kind)),
                    ("name", Value::text(name)),
                    ("value", Value::text(format!("value{key}"))),
                    (OWNER_FIELD, Value::Key(uint(1))),
                ],
            )
        })
        .collect()
}

/// Six rows in the default partition.
pub(crate) fn test_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_all(TEST_ENTITY, None, test_records())
        .expect("fixture rows should insert");

    store
}

pub(crate) fn test_catalog() -> Catalog {
    let mut catalog = Catalog::with_builtins();
    catalog
        .register_entity(test_model())
        .expect("fixture entity should register");

    catalog
}
