pub mod direction;
pub mod filter;
pub mod job;
pub mod predicate;
pub mod query;
pub mod range;
pub mod reader;
pub mod record;
pub mod registry;
pub mod split;
pub mod store;

use crate::{error::InternalError, model::EntityModel};

// re-exports
pub use direction::Direction;
pub use filter::{FilterFactorySpec, FilterRegistry, RecordPredicate};
pub use job::{DEFAULT_BATCH_SIZE, JobSpec};
pub use predicate::{CompareOp, FilterSpec};
pub use query::{OrderTerm, RangeQuery};
pub use range::{KeyRange, KeyRangeError, NamespaceRange};
pub use reader::{ShardIter, ShardReader};
pub use record::Record;
pub use registry::{EntityRegistry, RegistryError};
pub use split::ShardSplitter;
pub use store::{KeyScan, MemoryStore, OrderedRangeStore, Page, ResumeCursor, StoreError};

///
/// Catalog
///
/// Process-wide name resolution for splitters and readers: entity kinds to
/// models, and predicate factory names to constructors. Built once at
/// startup and shared by reference afterwards.
///

#[derive(Debug, Default)]
pub struct Catalog {
    pub entities: EntityRegistry,
    pub filters: FilterRegistry,
}

impl Catalog {
    #[must_use]
    pub const fn new(entities: EntityRegistry, filters: FilterRegistry) -> Self {
        Self { entities, filters }
    }

    /// Empty entity registry plus the built-in predicate factories.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new(EntityRegistry::new(), FilterRegistry::with_builtins())
    }

    /// Register one entity model.
    pub fn register_entity(&mut self, model: EntityModel) -> Result<(), InternalError> {
        self.entities.register(model)
    }
}
