//! Immutable range-query descriptors.
//!
//! A [`RangeQuery`] is built by a key range and consumed by a store adapter.
//! Constraints are an ordered list: caller filters first, then the range's
//! own `__key__` bounds.

use crate::{
    db::{
        direction::Direction,
        predicate::{CompareOp, FilterSpec},
    },
    key::Key,
    model::PRIMARY_KEY_FIELD,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::ops::Bound;

///
/// OrderTerm
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct OrderTerm {
    pub field: String,
    pub direction: Direction,
}

impl OrderTerm {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Primary-key order in one direction.
    #[must_use]
    pub fn primary_key(direction: Direction) -> Self {
        Self {
            field: PRIMARY_KEY_FIELD.to_string(),
            direction,
        }
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.field == PRIMARY_KEY_FIELD
    }
}

///
/// RangeQuery
///
/// Ordered, optionally keys-only query over one entity in one partition.
/// Builder methods consume and return the descriptor; nothing is shared or
/// mutated behind the caller's back.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RangeQuery {
    entity: String,
    partition: Option<String>,
    keys_only: bool,
    filters: Vec<FilterSpec>,
    order: Vec<OrderTerm>,
}

impl RangeQuery {
    #[must_use]
    pub fn new(entity: impl Into<String>, partition: Option<String>) -> Self {
        Self {
            entity: entity.into(),
            partition,
            keys_only: false,
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    #[must_use]
    pub const fn keys_only(mut self, keys_only: bool) -> Self {
        self.keys_only = keys_only;
        self
    }

    /// Append one constraint.
    #[must_use]
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append one order term.
    #[must_use]
    pub fn order_by(mut self, term: OrderTerm) -> Self {
        self.order.push(term);
        self
    }

    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    #[must_use]
    pub const fn is_keys_only(&self) -> bool {
        self.keys_only
    }

    #[must_use]
    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    #[must_use]
    pub fn order(&self) -> &[OrderTerm] {
        &self.order
    }

    /// Scan direction when the order is by primary key only.
    ///
    /// Returns `None` when any order term names a regular field.
    #[must_use]
    pub fn primary_key_direction(&self) -> Option<Direction> {
        match self.order.as_slice() {
            [] => Some(Direction::Asc),
            [term] if term.is_primary_key() => Some(term.direction),
            _ => None,
        }
    }

    /// Tightest primary-key interval implied by the `__key__` constraints.
    #[must_use]
    pub fn key_bounds(&self) -> (Bound<Key>, Bound<Key>) {
        let mut lower = Bound::Unbounded;
        let mut upper = Bound::Unbounded;

        for filter in &self.filters {
            if filter.field != PRIMARY_KEY_FIELD {
                continue;
            }
            let Value::Key(key) = &filter.value else {
                continue;
            };

            match filter.op {
                CompareOp::Gt => lower = tighter_lower(lower, Bound::Excluded(key.clone())),
                CompareOp::Gte => lower = tighter_lower(lower, Bound::Included(key.clone())),
                CompareOp::Lt => upper = tighter_upper(upper, Bound::Excluded(key.clone())),
                CompareOp::Lte => upper = tighter_upper(upper, Bound::Included(key.clone())),
                CompareOp::Eq => {
                    lower = tighter_lower(lower, Bound::Included(key.clone()));
                    upper = tighter_upper(upper, Bound::Included(key.clone()));
                }
                CompareOp::Ne | CompareOp::In | CompareOp::NotIn => {}
            }
        }

        (lower, upper)
    }
}

/// Pick the more restrictive of two lower bounds.
pub(crate) fn tighter_lower(left: Bound<Key>, right: Bound<Key>) -> Bound<Key> {
    match (&left, &right) {
        (Bound::Unbounded, _) => right,
        (_, Bound::Unbounded) => left,
        (
            Bound::Included(a) | Bound::Excluded(a),
            Bound::Included(b) | Bound::Excluded(b),
        ) => {
            if a > b || (a == b && matches!(left, Bound::Excluded(_))) {
                left
            } else {
                right
            }
        }
    }
}

/// Pick the more restrictive of two upper bounds.
pub(crate) fn tighter_upper(left: Bound<Key>, right: Bound<Key>) -> Bound<Key> {
    match (&left, &right) {
        (Bound::Unbounded, _) => right,
        (_, Bound::Unbounded) => left,
        (
            Bound::Included(a) | Bound::Excluded(a),
            Bound::Included(b) | Bound::Excluded(b),
        ) => {
            if a < b || (a == b && matches!(left, Bound::Excluded(_))) {
                left
            } else {
                right
            }
        }
    }
}

/// Whether no key can satisfy both bounds.
#[must_use]
pub(crate) fn bounds_are_empty(lower: &Bound<Key>, upper: &Bound<Key>) -> bool {
    match (lower, upper) {
        (Bound::Included(a), Bound::Included(b)) => a > b,
        (Bound::Included(a) | Bound::Excluded(a), Bound::Excluded(b))
        | (Bound::Excluded(a), Bound::Included(b)) => a >= b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_filter(op: CompareOp, key: u64) -> FilterSpec {
        FilterSpec::new(PRIMARY_KEY_FIELD, op, Key::Uint(key))
    }

    #[test]
    fn key_bounds_intersect_every_key_constraint() {
        let query = RangeQuery::new("tests::Entity", None)
            .filter(key_filter(CompareOp::Gte, 2))
            .filter(key_filter(CompareOp::Gt, 3))
            .filter(key_filter(CompareOp::Lt, 9))
            .filter(key_filter(CompareOp::Lte, 6));

        assert_eq!(
            query.key_bounds(),
            (
                Bound::Excluded(Key::Uint(3)),
                Bound::Included(Key::Uint(6))
            )
        );
    }

    #[test]
    fn exclusive_bound_wins_a_tie() {
        assert_eq!(
            tighter_lower(
                Bound::Included(Key::Uint(3)),
                Bound::Excluded(Key::Uint(3))
            ),
            Bound::Excluded(Key::Uint(3))
        );
        assert_eq!(
            tighter_upper(
                Bound::Excluded(Key::Uint(3)),
                Bound::Included(Key::Uint(3))
            ),
            Bound::Excluded(Key::Uint(3))
        );
    }

    #[test]
    fn empty_bounds_are_detected() {
        let three = || Key::Uint(3);

        assert!(bounds_are_empty(
            &Bound::Included(three()),
            &Bound::Excluded(three())
        ));
        assert!(!bounds_are_empty(
            &Bound::Included(three()),
            &Bound::Included(three())
        ));
        assert!(bounds_are_empty(
            &Bound::Included(Key::Uint(4)),
            &Bound::Included(three())
        ));
        assert!(!bounds_are_empty(&Bound::Unbounded, &Bound::Excluded(three())));
    }

    #[test]
    fn primary_key_direction_requires_key_only_order() {
        let query = RangeQuery::new("tests::Entity", None);
        assert_eq!(query.primary_key_direction(), Some(Direction::Asc));

        let query = query.order_by(OrderTerm::primary_key(Direction::Desc));
        assert_eq!(query.primary_key_direction(), Some(Direction::Desc));

        let query = RangeQuery::new("tests::Entity", None).order_by(OrderTerm::asc("name"));
        assert_eq!(query.primary_key_direction(), None);
    }
}
