// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{cmp::Ordering, fmt::Display};

use message_model::{NumberBound, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumberWrapper {
    Int(i64),
    Float(f64),
}

impl NumberWrapper {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(value) => Some(NumberWrapper::Int(*value)),
            Value::Float(value) => Some(NumberWrapper::Float(*value)),
            _ => None,
        }
    }
}

impl From<&NumberBound> for NumberWrapper {
    fn from(bound: &NumberBound) -> Self {
        match bound {
            NumberBound::Int(value) => NumberWrapper::Int(*value),
            NumberBound::Float(value) => NumberWrapper::Float(*value),
        }
    }
}

impl Display for NumberWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberWrapper::Int(value) => write!(f, "{value}"),
            NumberWrapper::Float(value) => write!(f, "{value:?}"),
        }
    }
}

/// Partial ordering across integers and floats. `None` only when a NaN is involved.
impl PartialOrd for NumberWrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (NumberWrapper::Int(left), NumberWrapper::Int(right)) => Some(left.cmp(right)),
            (NumberWrapper::Int(left), NumberWrapper::Float(right)) => compare_i64_f64(*left, *right),
            (NumberWrapper::Float(left), NumberWrapper::Int(right)) => compare_f64_i64(*left, *right),
            (NumberWrapper::Float(left), NumberWrapper::Float(right)) => left.partial_cmp(right),
        }
    }
}

// 2^63: the first float above every i64
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// Exact comparison. Casting the integer to `f64` would round above 2^53.
fn compare_i64_f64(left: i64, right: f64) -> Option<Ordering> {
    if right.is_nan() {
        return None;
    }
    if right >= I64_UPPER {
        return Some(Ordering::Less);
    }
    if right < -I64_UPPER {
        return Some(Ordering::Greater);
    }

    // In range, so the truncated float is exactly representable as an i64
    let whole = right.trunc() as i64;
    Some(left.cmp(&whole).then_with(|| {
        let fraction = right.fract();
        if fraction > 0.0 {
            Ordering::Less
        } else if fraction < 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }))
}

fn compare_f64_i64(left: f64, right: i64) -> Option<Ordering> {
    compare_i64_f64(right, left).map(Ordering::reverse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_eq() {
        let ones = [NumberWrapper::Int(1), NumberWrapper::Float(1.0)];

        for left in &ones {
            for right in &ones {
                assert_eq!(left.partial_cmp(right), Some(Ordering::Equal));
            }
        }
    }

    #[test]
    fn test_number_lt() {
        let mins = [NumberWrapper::Int(i64::MIN), NumberWrapper::Float(f64::MIN)];
        let maxs = [NumberWrapper::Int(i64::MAX), NumberWrapper::Float(f64::MAX)];

        // any min is less than any max
        for left in &mins {
            for right in &maxs {
                assert_eq!(left.partial_cmp(right), Some(Ordering::Less));
                assert_eq!(right.partial_cmp(left), Some(Ordering::Greater));
            }
        }
    }

    #[test]
    fn test_large_integers_keep_precision() {
        let two_pow_53 = 9_007_199_254_740_992_i64;

        assert_eq!(
            NumberWrapper::Int(two_pow_53 + 1).partial_cmp(&NumberWrapper::Float(two_pow_53 as f64)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            NumberWrapper::Float(two_pow_53 as f64).partial_cmp(&NumberWrapper::Int(two_pow_53 + 1)),
            Some(Ordering::Less)
        );
        // i64::MAX rounds to 2^63 as a float, which is still above it
        assert_eq!(
            NumberWrapper::Int(i64::MAX).partial_cmp(&NumberWrapper::Float(i64::MAX as f64)),
            Some(Ordering::Less)
        );
        assert_eq!(
            NumberWrapper::Int(i64::MIN).partial_cmp(&NumberWrapper::Float(i64::MIN as f64)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            NumberWrapper::Int(-3).partial_cmp(&NumberWrapper::Float(-2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            NumberWrapper::Int(2).partial_cmp(&NumberWrapper::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            NumberWrapper::Int(0).partial_cmp(&NumberWrapper::Float(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_nan_is_unordered() {
        let nan = NumberWrapper::Float(f64::NAN);
        assert_eq!(nan.partial_cmp(&NumberWrapper::Int(0)), None);
        assert_eq!(NumberWrapper::Int(0).partial_cmp(&nan), None);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(
            NumberWrapper::from_value(&Value::Int(3)),
            Some(NumberWrapper::Int(3))
        );
        assert_eq!(NumberWrapper::from_value(&Value::from("3")), None);
        assert_eq!(
            NumberWrapper::from(&NumberBound::Float(2.5)),
            NumberWrapper::Float(2.5)
        );
    }
}
