//! Shard readers.
//!
//! A [`ShardReader`] owns an ordered list of key ranges of one entity kind
//! and streams their records page by page. Readers are plain data: they are
//! serialized at the dispatch boundary, shipped to a worker, rebuilt there
//! (re-resolving their predicate filter locally) and iterated.

mod iter;
mod wire;

#[cfg(test)]
mod tests;

use crate::{
    db::{
        Catalog,
        filter::{FilterFactorySpec, FilterRegistry, RecordPredicate},
        predicate::FilterSpec,
        range::{KeyRange, NamespaceRange},
        registry::RegistryError,
        store::{OrderedRangeStore, ResumeCursor},
    },
    error::InternalError,
};
use std::fmt;

pub use iter::ShardIter;

///
/// PreMapFilter
///
/// Locally resolved state of a reader's predicate filter.
/// A failed resolution is kept and reported when iteration starts.
///

#[derive(Clone, Default)]
pub(crate) enum PreMapFilter {
    #[default]
    None,
    Resolved(RecordPredicate),
    Failed(RegistryError),
}

impl fmt::Debug for PreMapFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Resolved(_) => f.write_str("Resolved(<predicate>)"),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

///
/// ShardReader
///
/// Iteration state for one shard: the owned ranges (a slot becomes `None`
/// once its range is fully read), the range currently being read (narrowed
/// past every consumed key) and the store cursor for the next page.
///
/// When `key_ranges` is absent the reader walks whole partitions inside
/// `namespace_range` instead.
///

#[derive(Clone, Debug)]
pub struct ShardReader {
    entity_kind: String,
    key_ranges: Option<Vec<Option<KeyRange>>>,
    namespace_range: Option<NamespaceRange>,
    current_key_range: Option<KeyRange>,
    batch_size: usize,
    filters: Vec<FilterSpec>,
    filter_factory_spec: Option<FilterFactorySpec>,
    filter: PreMapFilter,
    resume_cursor: Option<ResumeCursor>,
}

impl ShardReader {
    /// Reader over an explicit list of key ranges.
    #[must_use]
    pub fn new(
        entity_kind: impl Into<String>,
        key_ranges: Vec<KeyRange>,
        batch_size: usize,
        filters: Vec<FilterSpec>,
    ) -> Self {
        Self {
            entity_kind: entity_kind.into(),
            key_ranges: Some(key_ranges.into_iter().map(Some).collect()),
            namespace_range: None,
            current_key_range: None,
            batch_size,
            filters,
            filter_factory_spec: None,
            filter: PreMapFilter::None,
            resume_cursor: None,
        }
    }

    /// Reader over every partition inside `namespace_range`.
    #[must_use]
    pub fn for_namespaces(
        entity_kind: impl Into<String>,
        namespace_range: NamespaceRange,
        batch_size: usize,
        filters: Vec<FilterSpec>,
    ) -> Self {
        Self {
            key_ranges: None,
            namespace_range: Some(namespace_range),
            ..Self::new(entity_kind, Vec::new(), batch_size, filters)
        }
    }

    #[must_use]
    pub fn entity_kind(&self) -> &str {
        &self.entity_kind
    }

    /// Owned range slots; emptied slots are `None`.
    #[must_use]
    pub fn key_ranges(&self) -> Option<&[Option<KeyRange>]> {
        self.key_ranges.as_deref()
    }

    #[must_use]
    pub const fn namespace_range(&self) -> Option<&NamespaceRange> {
        self.namespace_range.as_ref()
    }

    #[must_use]
    pub const fn current_key_range(&self) -> Option<&KeyRange> {
        self.current_key_range.as_ref()
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    #[must_use]
    pub const fn filter_factory_spec(&self) -> Option<&FilterFactorySpec> {
        self.filter_factory_spec.as_ref()
    }

    #[must_use]
    pub const fn resume_cursor(&self) -> Option<&ResumeCursor> {
        self.resume_cursor.as_ref()
    }

    /// Whether a predicate filter resolved and is attached.
    #[must_use]
    pub const fn has_predicate(&self) -> bool {
        matches!(self.filter, PreMapFilter::Resolved(_))
    }

    /// Whether every owned range has been fully read.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current_key_range.is_none()
            && self.namespace_range.is_none()
            && self
                .key_ranges
                .as_ref()
                .is_none_or(|slots| slots.iter().all(Option::is_none))
    }

    /// Attach a predicate filter built from `spec`.
    ///
    /// `None` and empty specs are a no-op. Resolution only constructs the
    /// predicate locally, so repeating it with the same spec is harmless;
    /// a failure is recorded and returned by [`Self::iter`].
    pub fn inject_filter(&mut self, spec: Option<FilterFactorySpec>, registry: &FilterRegistry) {
        let Some(spec) = spec.filter(|spec| !spec.is_empty()) else {
            return;
        };

        self.filter = match registry.resolve(&spec) {
            Ok(predicate) => PreMapFilter::Resolved(predicate),
            Err(err) => {
                tracing::warn!(
                    entity = %self.entity_kind,
                    factory = %spec.name,
                    error = %err,
                    "predicate filter did not resolve"
                );
                PreMapFilter::Failed(err)
            }
        };
        self.filter_factory_spec = Some(spec);
    }

    /// Start (or continue) iterating this reader's records.
    ///
    /// Progress is written back into the reader as records are yielded, so
    /// serializing it at any point captures a resumable checkpoint.
    pub fn iter<'a>(
        &'a mut self,
        catalog: &Catalog,
        store: &'a dyn OrderedRangeStore,
    ) -> Result<ShardIter<'a>, InternalError> {
        let predicate = match &self.filter {
            PreMapFilter::None => None,
            PreMapFilter::Resolved(predicate) => Some(predicate.clone()),
            PreMapFilter::Failed(err) => return Err(err.clone().into()),
        };
        let model = catalog.entities.try_get(&self.entity_kind)?;

        Ok(ShardIter::new(self, model, store, predicate))
    }

    /// Build a reader from its JSON form, re-resolving the predicate filter.
    pub fn from_json(
        value: &serde_json::Value,
        registry: &FilterRegistry,
    ) -> Result<Self, InternalError> {
        let mut reader = wire::decode(value)?;
        let spec = reader.filter_factory_spec.take();
        reader.inject_filter(spec, registry);

        Ok(reader)
    }

    /// Parse a JSON document and build a reader from it.
    pub fn from_json_str(raw: &str, registry: &FilterRegistry) -> Result<Self, InternalError> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|err| {
            InternalError::reader_corruption(format!("malformed shard reader: {err}"))
        })?;

        Self::from_json(&value, registry)
    }

    /// JSON form of the reader, including its progress.
    pub fn to_json(&self) -> Result<serde_json::Value, InternalError> {
        wire::encode(self)
    }

    // Pick the range to read next, or `None` when the reader is done.
    fn next_range(
        &mut self,
        store: &dyn OrderedRangeStore,
    ) -> Result<Option<KeyRange>, InternalError> {
        if let Some(range) = &self.current_key_range {
            return Ok(Some(range.clone()));
        }

        if let Some(slots) = &self.key_ranges {
            self.current_key_range = slots.iter().flatten().next().cloned();
            return Ok(self.current_key_range.clone());
        }

        let Some(namespaces) = &self.namespace_range else {
            return Ok(None);
        };
        let mut partitions = store.partitions(&self.entity_kind)?;
        partitions.sort();

        match partitions.into_iter().find(|p| namespaces.contains(p)) {
            Some(partition) => {
                let partition = (!partition.is_empty()).then_some(partition);
                self.current_key_range = Some(KeyRange::unbounded(partition));
            }
            None => self.namespace_range = None,
        }

        Ok(self.current_key_range.clone())
    }

    // Drop the current range once its last page has been consumed.
    fn finish_current_range(&mut self) {
        let Some(range) = self.current_key_range.take() else {
            return;
        };
        self.resume_cursor = None;

        if let Some(slots) = &mut self.key_ranges {
            if let Some(slot) = slots.iter_mut().find(|slot| slot.is_some()) {
                *slot = None;
            }
        } else if let Some(namespaces) = &self.namespace_range {
            let partition = range.partition().unwrap_or_default();
            self.namespace_range = namespaces.advance_past(partition);
        }
    }
}
