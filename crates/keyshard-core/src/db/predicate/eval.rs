use crate::{
    db::{
        predicate::{CompareOp, FilterSpec},
        record::Record,
    },
    value::{Value, strict_order_cmp},
};
use std::cmp::Ordering;

/// Evaluate every filter against one record (logical AND).
#[must_use]
pub(crate) fn eval_all(record: &Record, filters: &[FilterSpec]) -> bool {
    filters.iter().all(|filter| eval_filter(record, filter))
}

///
/// Evaluate a single comparison filter against a record.
///
/// Returns `false` if:
/// - the field is missing
/// - the comparison is not defined for the two values
///
#[must_use]
pub(crate) fn eval_filter(record: &Record, filter: &FilterSpec) -> bool {
    let Some(actual) = record.field(&filter.field) else {
        return false;
    };
    let expected = &filter.value;

    match filter.op {
        CompareOp::Eq => compare(&actual, expected).is_some_and(Ordering::is_eq),
        CompareOp::Ne => compare(&actual, expected).is_some_and(Ordering::is_ne),
        CompareOp::Lt => compare(&actual, expected).is_some_and(Ordering::is_lt),
        CompareOp::Lte => compare(&actual, expected).is_some_and(Ordering::is_le),
        CompareOp::Gt => compare(&actual, expected).is_some_and(Ordering::is_gt),
        CompareOp::Gte => compare(&actual, expected).is_some_and(Ordering::is_ge),
        CompareOp::In => in_list(&actual, expected).unwrap_or(false),
        CompareOp::NotIn => in_list(&actual, expected).is_some_and(|matched| !matched),
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    strict_order_cmp(actual, expected)
}

// None when the literal is not a list; invalid comparisons count as non-matches.
fn in_list(actual: &Value, list: &Value) -> Option<bool> {
    let candidates = list.as_list()?;

    Some(
        candidates
            .iter()
            .any(|candidate| compare(actual, candidate).is_some_and(Ordering::is_eq)),
    )
}
