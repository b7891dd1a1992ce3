use crate::{
    db::{
        direction::Direction,
        predicate::eval_all,
        query::{OrderTerm, RangeQuery, bounds_are_empty, tighter_lower, tighter_upper},
        record::Record,
        store::{CursorToken, OrderedRangeStore, Page, ResumeCursor, StoreError},
    },
    error::InternalError,
    key::Key,
    value::{Value, canonical_cmp},
};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    ops::Bound,
    sync::{RwLock, RwLockReadGuard},
};

type PartitionRows = BTreeMap<Key, Record>;
type EntityPartitions = BTreeMap<String, PartitionRows>;

///
/// MemoryStore
///
/// In-process ordered store: entity path -> partition -> rows by key.
/// The default partition is stored under the empty string.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<BTreeMap<String, EntityPartitions>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one row.
    pub fn insert(
        &self,
        entity: &str,
        partition: Option<&str>,
        record: Record,
    ) -> Result<(), InternalError> {
        let mut entities = self
            .entities
            .write()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))?;

        entities
            .entry(entity.to_string())
            .or_default()
            .entry(partition.unwrap_or_default().to_string())
            .or_default()
            .insert(record.key().clone(), record);

        Ok(())
    }

    /// Insert every row of `records` into one partition.
    pub fn insert_all(
        &self,
        entity: &str,
        partition: Option<&str>,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<(), InternalError> {
        for record in records {
            self.insert(entity, partition, record)?;
        }

        Ok(())
    }

    /// Number of rows stored for `entity` in one partition.
    pub fn len(&self, entity: &str, partition: Option<&str>) -> Result<usize, InternalError> {
        let entities = self.read()?;

        Ok(entities
            .get(entity)
            .and_then(|partitions| partitions.get(partition.unwrap_or_default()))
            .map_or(0, BTreeMap::len))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, EntityPartitions>>, StoreError> {
        self.entities
            .read()
            .map_err(|_| StoreError::backend("memory store lock poisoned"))
    }
}

impl OrderedRangeStore for MemoryStore {
    fn fetch_page(
        &self,
        query: &RangeQuery,
        limit: usize,
        cursor: Option<&ResumeCursor>,
    ) -> Result<Page, InternalError> {
        if limit == 0 {
            return Err(StoreError::InvalidPageSize.into());
        }

        let after = cursor
            .map(|cursor| CursorToken::resume_after(cursor, query))
            .transpose()?;

        let entities = self.read()?;
        let Some(rows) = entities
            .get(query.entity())
            .and_then(|partitions| partitions.get(query.partition().unwrap_or_default()))
        else {
            return Ok(Page::default());
        };

        // One row past the limit tells whether another page exists.
        let take = limit.saturating_add(1);
        let mut matched = match query.primary_key_direction() {
            Some(direction) => key_ordered_rows(rows, query, direction, after.as_ref(), take),
            None => field_ordered_rows(rows, query, after.as_ref(), take)?,
        };

        let more = matched.len() > limit;
        matched.truncate(limit);

        let next_cursor = match matched.last() {
            Some(last) => Some(CursorToken::new(query, last.key().clone()).encode()?),
            None => None,
        };
        let records = matched
            .into_iter()
            .map(|record| {
                if query.is_keys_only() {
                    Record::key_only(record.key().clone())
                } else {
                    record.clone()
                }
            })
            .collect::<Vec<_>>();

        tracing::trace!(
            entity = query.entity(),
            partition = query.partition().unwrap_or_default(),
            rows = records.len(),
            more,
            "memory store page"
        );

        Ok(Page {
            records,
            next_cursor,
            more,
        })
    }

    fn partitions(&self, entity: &str) -> Result<Vec<String>, InternalError> {
        let entities = self.read()?;

        Ok(entities
            .get(entity)
            .map(|partitions| {
                partitions
                    .iter()
                    .filter(|(_, rows)| !rows.is_empty())
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

// Primary-key order: walk the key index between the query bounds.
fn key_ordered_rows<'a>(
    rows: &'a PartitionRows,
    query: &RangeQuery,
    direction: Direction,
    after: Option<&Key>,
    take: usize,
) -> Vec<&'a Record> {
    let (mut lower, mut upper) = query.key_bounds();
    if let Some(after) = after {
        match direction {
            Direction::Asc => lower = tighter_lower(lower, Bound::Excluded(after.clone())),
            Direction::Desc => upper = tighter_upper(upper, Bound::Excluded(after.clone())),
        }
    }

    // BTreeMap::range panics on inverted bounds.
    if bounds_are_empty(&lower, &upper) {
        return Vec::new();
    }

    let range = rows.range((lower, upper)).map(|(_, record)| record);
    let matching = |record: &&Record| eval_all(record, query.filters());

    match direction {
        Direction::Asc => range.filter(matching).take(take).collect(),
        Direction::Desc => range.rev().filter(matching).take(take).collect(),
    }
}

// Field order: sort matching rows by the order terms, then by key.
fn field_ordered_rows<'a>(
    rows: &'a PartitionRows,
    query: &RangeQuery,
    after: Option<&Key>,
    take: usize,
) -> Result<Vec<&'a Record>, StoreError> {
    let mut matched: Vec<&Record> = rows
        .values()
        .filter(|record| eval_all(record, query.filters()))
        .collect();
    matched.sort_by(|left, right| compare_by_terms(left, right, query.order()));

    let skip = match after {
        Some(after) => {
            let position = matched
                .iter()
                .position(|record| record.key() == after)
                .ok_or_else(|| {
                    StoreError::invalid_cursor(format!("cursor row {after} no longer matches"))
                })?;
            position + 1
        }
        None => 0,
    };

    Ok(matched.into_iter().skip(skip).take(take).collect())
}

fn compare_by_terms(left: &Record, right: &Record, order: &[OrderTerm]) -> Ordering {
    for term in order {
        let left_value = left.field(&term.field).unwrap_or(Value::Null);
        let right_value = right.field(&term.field).unwrap_or(Value::Null);

        let cmp = match term.direction {
            Direction::Asc => canonical_cmp(&left_value, &right_value),
            Direction::Desc => canonical_cmp(&right_value, &left_value),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    left.key().cmp(right.key())
}
