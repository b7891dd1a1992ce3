use anyhow::{Context, Result, bail};
use keyshard_core::{
    db::{Catalog, MemoryStore, Record},
    key::Key,
    model::{EntityModel, FieldKind},
    value::Value,
};
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};

///
/// DatasetFile
///
/// On-disk fixture: entity models plus the records to load into an
/// in-memory store.
///

#[derive(Debug, Deserialize)]
struct DatasetFile {
    entities: Vec<EntityModel>,
    #[serde(default)]
    records: Vec<DatasetRecord>,
}

#[derive(Debug, Deserialize)]
struct DatasetRecord {
    entity: String,
    #[serde(default)]
    partition: Option<String>,
    key: Key,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

///
/// Dataset
///

pub struct Dataset {
    pub catalog: Catalog,
    pub store: MemoryStore,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading dataset {}", path.display()))?;
        let file: DatasetFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing dataset {}", path.display()))?;

        let mut catalog = Catalog::with_builtins();
        for model in file.entities {
            catalog.register_entity(model)?;
        }

        let store = MemoryStore::new();
        for record in file.records {
            let model = catalog.entities.try_get(&record.entity)?;
            let fields = coerce_references(&model, record.fields)
                .with_context(|| format!("record {} of {}", record.key, record.entity))?;

            store.insert(
                &record.entity,
                record.partition.as_deref(),
                Record::new(record.key, fields),
            )?;
        }

        tracing::debug!(entities = catalog.entities.paths().count(), "dataset loaded");

        Ok(Self { catalog, store })
    }
}

// JSON carries keys as text; reference fields store them as keys.
fn coerce_references(
    model: &EntityModel,
    fields: BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>> {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match (model.field_kind(&name), value) {
                (Some(FieldKind::Reference { .. }), Value::Text(text)) => {
                    Value::Key(text.parse().with_context(|| format!("field '{name}'"))?)
                }
                (None, _) => bail!("unknown field '{name}'"),
                (_, value) => value,
            };

            Ok((name, value))
        })
        .collect()
}
