use crate::value::Value;
use std::cmp::Ordering;

/// Total canonical comparator used for ordering records by field values.
///
/// Ordering rules:
/// 1. Canonical variant rank (numeric variants share one rank)
/// 2. Variant-specific comparison for same-ranked values
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = canonical_rank(left).cmp(&canonical_rank(right));
    if rank != Ordering::Equal {
        return rank;
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Key(a), Value::Key(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => canonical_cmp_list(a, b),
        _ => strict_order_cmp(left, right).unwrap_or(Ordering::Equal),
    }
}

/// Strict comparator for filter evaluation.
///
/// Returns `None` for mismatched or non-orderable variants.
/// Signed and unsigned integers compare numerically.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Uint(a), Value::Uint(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Uint(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Uint(a), Value::Int(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Key(a), Value::Key(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Uint(_) => 2,
        Value::Text(_) => 3,
        Value::Key(_) => 4,
        Value::List(_) => 5,
    }
}

fn canonical_cmp_list(left: &[Value], right: &[Value]) -> Ordering {
    for (left, right) in left.iter().zip(right.iter()) {
        let cmp = canonical_cmp(left, right);
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    left.len().cmp(&right.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;

    #[test]
    fn mixed_sign_integers_compare_numerically() {
        assert_eq!(
            strict_order_cmp(&Value::Int(-1), &Value::Uint(0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            canonical_cmp(&Value::Uint(u64::MAX), &Value::Int(i64::MAX)),
            Ordering::Greater
        );
    }

    #[test]
    fn mismatched_variants_are_not_strictly_orderable() {
        assert_eq!(strict_order_cmp(&Value::text("1"), &Value::Int(1)), None);
        assert_eq!(
            strict_order_cmp(&Value::Key(Key::Uint(1)), &Value::text("uint:1")),
            None
        );
    }

    #[test]
    fn null_sorts_before_everything_else() {
        let mut values = vec![
            Value::text("b"),
            Value::Null,
            Value::Int(3),
            Value::Bool(false),
        ];
        values.sort_by(canonical_cmp);

        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(false),
                Value::Int(3),
                Value::text("b")
            ]
        );
    }
}
