use crate::{
    error::{ErrorClass, ErrorDetail, ErrorOrigin, InternalError},
    model::EntityModel,
};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("entity kind '{0}' does not resolve to a registered collection")]
    UnresolvedCollectionType(String),

    #[error("filter factory '{0}' is not registered")]
    UnresolvedPredicateFactory(String),

    #[error("entity kind '{0}' already registered")]
    EntityAlreadyRegistered(String),

    #[error("filter factory '{0}' already registered")]
    FactoryAlreadyRegistered(String),

    #[error("filter factory '{name}' rejected its arguments: {reason}")]
    InvalidFactoryArgs { name: String, reason: String },
}

impl RegistryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::UnresolvedCollectionType(_) | Self::UnresolvedPredicateFactory(_) => {
                ErrorClass::NotFound
            }
            Self::EntityAlreadyRegistered(_) | Self::FactoryAlreadyRegistered(_) => {
                ErrorClass::InvariantViolation
            }
            Self::InvalidFactoryArgs { .. } => ErrorClass::Unsupported,
        }
    }
}

impl From<RegistryError> for InternalError {
    fn from(err: RegistryError) -> Self {
        Self::with_detail(
            err.class(),
            ErrorOrigin::Registry,
            err.to_string(),
            ErrorDetail::Registry(err),
        )
    }
}

///
/// EntityRegistry
///
/// Collection type resolver: maps entity-kind paths to their models.
/// Populated once at process startup and shared read-only afterwards.
///

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Arc<EntityModel>>,
}

impl EntityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one entity model under its own path.
    pub fn register(&mut self, model: EntityModel) -> Result<(), InternalError> {
        let path = model.path().to_string();
        if self.entities.contains_key(&path) {
            return Err(RegistryError::EntityAlreadyRegistered(path).into());
        }

        self.entities.insert(path, Arc::new(model));
        Ok(())
    }

    /// Resolve an entity-kind path to its model.
    pub fn try_get(&self, path: &str) -> Result<Arc<EntityModel>, InternalError> {
        self.entities
            .get(path)
            .cloned()
            .ok_or_else(|| RegistryError::UnresolvedCollectionType(path.to_string()).into())
    }

    /// Iterate registered entity paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, FieldModel};

    const ENTITY_PATH: &str = "registry_tests::Entity";

    fn model() -> EntityModel {
        EntityModel::new(ENTITY_PATH, vec![FieldModel::new("name", FieldKind::Text)])
    }

    #[test]
    fn registered_entity_resolves_by_path() {
        let mut registry = EntityRegistry::new();
        registry
            .register(model())
            .expect("initial registration should succeed");

        let resolved = registry
            .try_get(ENTITY_PATH)
            .expect("registered path should resolve");
        assert_eq!(resolved.path(), ENTITY_PATH);
        assert_eq!(registry.paths().collect::<Vec<_>>(), vec![ENTITY_PATH]);
    }

    #[test]
    fn missing_entity_path_is_unresolved_collection_type() {
        let registry = EntityRegistry::new();
        let err = registry
            .try_get("registry_tests::Missing")
            .expect_err("missing path should fail lookup");

        assert_eq!(err.class, ErrorClass::NotFound);
        assert_eq!(err.origin, ErrorOrigin::Registry);
        assert!(matches!(
            err.as_registry_error(),
            Some(RegistryError::UnresolvedCollectionType(_))
        ));
        assert!(
            err.message.contains("registry_tests::Missing"),
            "missing lookup should include the missing path"
        );
    }

    #[test]
    fn duplicate_entity_registration_is_rejected() {
        let mut registry = EntityRegistry::new();
        registry
            .register(model())
            .expect("initial registration should succeed");

        let err = registry
            .register(model())
            .expect_err("duplicate registration should fail");
        assert_eq!(err.class, ErrorClass::InvariantViolation);
        assert!(err.message.contains("already registered"));
    }
}
