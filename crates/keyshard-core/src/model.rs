//! Runtime descriptors for record collections.
//!
//! The splitter and readers never see concrete record types; they work from
//! an [`EntityModel`] resolved by name through the entity registry.

use serde::{Deserialize, Serialize};

/// Pseudo-field naming the primary key in filters and order terms.
pub const PRIMARY_KEY_FIELD: &str = "__key__";

///
/// EntityModel
///
/// Descriptor for one collection ("kind"): its registry path and the
/// fields records may carry. Records are always keyed by an ordered
/// primary key.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityModel {
    path: String,
    #[serde(default)]
    fields: Vec<FieldModel>,
}

impl EntityModel {
    #[must_use]
    pub fn new(path: impl Into<String>, fields: Vec<FieldModel>) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldModel] {
        &self.fields
    }

    /// Resolve the kind of one field, treating the primary-key pseudo-field
    /// as a reference to this entity.
    #[must_use]
    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        if name == PRIMARY_KEY_FIELD {
            return Some(FieldKind::Reference {
                target: self.path.clone(),
            });
        }

        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.kind.clone())
    }
}

///
/// FieldModel
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldModel {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldModel {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

///
/// FieldKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Uint,
    Text,
    List,
    Reference { target: String },
}

impl FieldKind {
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_field_resolves_as_self_reference() {
        let model = EntityModel::new("tests::Pet", vec![FieldModel::new("name", FieldKind::Text)]);

        assert_eq!(
            model.field_kind(PRIMARY_KEY_FIELD),
            Some(FieldKind::Reference {
                target: "tests::Pet".to_string()
            })
        );
        assert_eq!(model.field_kind("name"), Some(FieldKind::Text));
        assert_eq!(model.field_kind("missing"), None);
    }
}
