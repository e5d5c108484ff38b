//! # Bucket
//!
//! This module maps a fraction onto one of a fixed set of ranges delimited by sorted thresholds

pub mod labels;

use thiserror::Error;

/// Cut points used when nothing else is configured
pub const DEFAULT_THRESHOLDS: [f32; 6] = [0.15, 0.3, 0.5, 0.7, 0.85, 0.95];

/// Result of bucketing a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Index of the first threshold the value is strictly below
    Index(usize),
    /// The value is at or above every threshold
    AboveAll,
}

/// Returns the bucket of `value`: the first threshold strictly greater than it, or [`Bucket::AboveAll`].
///
/// A value equal to a threshold lands in the next bucket. NaN compares below nothing and lands in [`Bucket::AboveAll`].
pub fn bucket(value: f32, thresholds: &[f32]) -> Bucket {
    thresholds
        .iter()
        .position(|&t| value < t)
        .map_or(Bucket::AboveAll, Bucket::Index)
}

/// Errors when building a threshold table
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThresholdError {
    /// No thresholds at all
    #[error("threshold table is empty")]
    Empty,
    /// A threshold outside of (0, 1)
    #[error("threshold {value} at index {index} is outside of (0, 1)")]
    OutOfRange {
        /// Position of the offending threshold
        index: usize,
        /// Offending threshold
        value: f32,
    },
    /// A threshold not greater than the one before it
    #[error("threshold {value} at index {index} is not greater than the previous one")]
    NotIncreasing {
        /// Position of the offending threshold
        index: usize,
        /// Offending threshold
        value: f32,
    },
}

/// Strictly increasing cut points within (0, 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds(Vec<f32>);
impl Thresholds {
    /// Validates and wraps `values`
    pub fn new(values: Vec<f32>) -> Result<Self, ThresholdError> {
        if values.is_empty() {
            return Err(ThresholdError::Empty);
        }
        for (index, &value) in values.iter().enumerate() {
            if !(value > 0.0 && value < 1.0) {
                return Err(ThresholdError::OutOfRange { index, value });
            }
            if index > 0 && value <= values[index - 1] {
                return Err(ThresholdError::NotIncreasing { index, value });
            }
        }
        Ok(Self(values))
    }

    /// The cut points, ascending
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Number of cut points
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; an empty table is rejected by [`Thresholds::new`]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest cut point
    pub fn highest(&self) -> f32 {
        self.0[self.0.len() - 1]
    }

    /// Buckets `value` against this table
    pub fn bucket(&self, value: f32) -> Bucket {
        bucket(value, &self.0)
    }

    /// Iterates over `(lower, upper)` bounds of each bucket, the first lower bound being 0
    pub fn ranges(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.0
            .iter()
            .scan(0.0f32, |previous, &upper| {
                let lower = *previous;
                *previous = upper;
                Some((lower, upper))
            })
    }
}
impl Default for Thresholds {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLDS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// Every value lands on the smallest threshold above it
    fn test_monotonic() {
        let t = DEFAULT_THRESHOLDS;
        for step in 0..=100 {
            let v = step as f32 / 100.0;
            let expected = t.iter().position(|&x| v < x);
            match bucket(v, &t) {
                Bucket::Index(i) => {
                    assert_eq!(Some(i), expected);
                    assert!(i == 0 || v >= t[i - 1]);
                }
                Bucket::AboveAll => {
                    assert_eq!(expected, None);
                    assert!(v >= t[t.len() - 1]);
                }
            }
        }
    }

    #[test]
    /// Values equal to a threshold fall into the next bucket
    fn test_boundaries() {
        let t = DEFAULT_THRESHOLDS;
        for (i, &x) in t.iter().enumerate() {
            assert_eq!(bucket(x - 0.001, &t), Bucket::Index(i));
            let next = if i + 1 == t.len() {
                Bucket::AboveAll
            } else {
                Bucket::Index(i + 1)
            };
            assert_eq!(bucket(x, &t), next);
        }
        // 30 / 100 computed at runtime is the same float as the literal
        assert_eq!(bucket(30.0 / 100.0, &t), Bucket::Index(2));
    }

    #[test]
    /// Out of range values need no special casing
    fn test_out_of_range() {
        let t = DEFAULT_THRESHOLDS;
        assert_eq!(bucket(-0.5, &t), Bucket::Index(0));
        assert_eq!(bucket(0.0, &t), Bucket::Index(0));
        assert_eq!(bucket(1.0, &t), Bucket::AboveAll);
        assert_eq!(bucket(7.0, &t), Bucket::AboveAll);
        assert_eq!(bucket(f32::NAN, &t), Bucket::AboveAll);
        assert_eq!(bucket(0.4, &[]), Bucket::AboveAll);
    }

    #[test]
    /// 0.4 against the default table is the (0.3, 0.5) bucket
    fn test_scenario() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.bucket(40.0 / 100.0), Bucket::Index(2));
        assert_eq!(thresholds.bucket(100.0 / 100.0), Bucket::AboveAll);
        assert_eq!(thresholds.highest(), 0.95);
    }

    #[test]
    /// Bad tables are rejected
    fn test_validation() {
        assert_eq!(Thresholds::new(vec![]), Err(ThresholdError::Empty));
        assert_eq!(
            Thresholds::new(vec![0.2, 0.2]),
            Err(ThresholdError::NotIncreasing {
                index: 1,
                value: 0.2
            })
        );
        assert_eq!(
            Thresholds::new(vec![0.5, 1.0]),
            Err(ThresholdError::OutOfRange {
                index: 1,
                value: 1.0
            })
        );
        assert!(Thresholds::new(vec![0.0]).is_err());
        assert!(Thresholds::new(vec![f32::NAN]).is_err());
        assert_eq!(
            Thresholds::new(DEFAULT_THRESHOLDS.to_vec()),
            Ok(Thresholds::default())
        );
    }

    #[test]
    /// Ranges pair each threshold with the previous one
    fn test_ranges() {
        let thresholds = Thresholds::new(vec![0.25, 0.5]).unwrap();
        let ranges: Vec<_> = thresholds.ranges().collect();
        assert_eq!(ranges, [(0.0, 0.25), (0.25, 0.5)]);
    }
}
