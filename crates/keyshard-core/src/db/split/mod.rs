//! Shard splitting.
//!
//! One keys-only ascending pass over the collection samples every
//! `batch_size`-th key as a boundary. Consecutive boundaries form half-open
//! ranges, the last boundary opens an unbounded tail range, and ranges are
//! dealt round-robin to at most `shard_count` readers.


use crate::{
    db::{
        Catalog,
        job::JobSpec,
        range::KeyRange,
        reader::ShardReader,
        store::{KeyScan, OrderedRangeStore},
    },
    error::InternalError,
    key::Key,
    obs::sink::{self, MetricsEvent},
};

///
/// ShardSplitter
///
/// Turns a job spec into disjoint shard readers over one entity kind.
///

pub struct ShardSplitter<'a> {
    catalog: &'a Catalog,
    store: &'a dyn OrderedRangeStore,
}

impl<'a> ShardSplitter<'a> {
    #[must_use]
    pub const fn new(catalog: &'a Catalog, store: &'a dyn OrderedRangeStore) -> Self {
        Self { catalog, store }
    }

    /// Split `job`'s collection into at most `shard_count` readers.
    ///
    /// An empty (or fully filtered-out) collection yields no readers.
    pub fn split(&self, job: &JobSpec) -> Result<Vec<ShardReader>, InternalError> {
        job.validate()?;
        let model = self.catalog.entities.try_get(&job.entity_kind)?;

        sink::record(MetricsEvent::SplitStart {
            entity_path: model.path(),
            shard_count: job.shard_count,
            batch_size: job.batch_size,
        });

        let query = KeyRange::default().make_ascending_query(&model, true, &job.filters)?;
        let mut scan = KeyScan::new(self.store, query, job.batch_size);

        let mut boundaries = Vec::new();
        let mut keys_scanned = 0u64;
        let mut range_count = 0u64;
        for (index, key) in scan.by_ref().enumerate() {
            let key = key?;
            keys_scanned += 1;
            if index % job.batch_size == 0 {
                boundaries.push(key);
                range_count += 1;
            }
        }

        let ranges = boundary_ranges(boundaries);
        let mut reader_count = 0u64;
        let readers: Vec<ShardReader> = deal_round_robin(ranges, job.shard_count)
            .into_iter()
            .map(|ranges| {
                reader_count += 1;
                let mut reader = ShardReader::new(
                    job.entity_kind.clone(),
                    ranges,
                    job.batch_size,
                    job.filters.clone(),
                );
                reader.inject_filter(job.filter_factory_spec.clone(), &self.catalog.filters);
                reader
            })
            .collect();

        tracing::debug!(
            entity = model.path(),
            keys_scanned,
            pages = scan.pages(),
            ranges = range_count,
            readers = reader_count,
            "split finished"
        );
        sink::record(MetricsEvent::SplitFinish {
            entity_path: model.path(),
            keys_scanned,
            ranges: range_count,
            readers: reader_count,
        });

        Ok(readers)
    }
}

/// `[b0, b1), [b1, b2), ..., [bn, ∞)` over ascending boundary keys.
pub(crate) fn boundary_ranges(boundaries: Vec<Key>) -> Vec<KeyRange> {
    let mut ranges = Vec::with_capacity(boundaries.len());
    let mut boundaries = boundaries.into_iter().peekable();

    while let Some(start) = boundaries.next() {
        let end = boundaries.peek().cloned();
        ranges.push(KeyRange::half_open(start, end));
    }

    ranges
}

/// Range `i` goes to shard `i mod n`, with `n = min(shard_count, ranges)`.
pub(crate) fn deal_round_robin(ranges: Vec<KeyRange>, shard_count: usize) -> Vec<Vec<KeyRange>> {
    let shards = shard_count.min(ranges.len());
    let mut dealt = vec![Vec::new(); shards];

    for (index, range) in ranges.into_iter().enumerate() {
        dealt[index % shards].push(range);
    }

    dealt
}
