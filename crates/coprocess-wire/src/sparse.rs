//! Sparse numeric vectors
//!
//! A typical object-stream payload: a feature vector where most entries are
//! zero, carried as parallel index/value arrays with an optional weight.

use serde::{Deserialize, Serialize};

/// A sparse vector of `f64` values.
///
/// Decoding fails when `indices` and `values` differ in length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSparseVector")]
pub struct SparseVector {
    /// Positions of the non-zero entries, parallel to `values`.
    pub indices: Vec<u32>,
    /// Non-zero entries, parallel to `indices`.
    pub values: Vec<f64>,
    /// Instance weight; `None` when unweighted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Deserialize)]
struct RawSparseVector {
    indices: Vec<u32>,
    values: Vec<f64>,
    #[serde(default)]
    weight: Option<f64>,
}

impl TryFrom<RawSparseVector> for SparseVector {
    type Error = String;

    fn try_from(raw: RawSparseVector) -> Result<Self, Self::Error> {
        if raw.indices.len() != raw.values.len() {
            return Err(format!(
                "sparse vector has {} indices but {} values",
                raw.indices.len(),
                raw.values.len()
            ));
        }
        Ok(Self {
            indices: raw.indices,
            values: raw.values,
            weight: raw.weight,
        })
    }
}

impl SparseVector {
    /// Empty vector with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            weight: None,
        }
    }

    /// Append an entry.
    pub fn push(&mut self, index: u32, value: f64) {
        self.indices.push(index);
        self.values.push(value);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Value at `index`, or `0.0` if it is not stored or has no paired value.
    pub fn get(&self, index: u32) -> f64 {
        self.indices
            .iter()
            .position(|&i| i == index)
            .and_then(|pos| self.values.get(pos).copied())
            .unwrap_or(0.0)
    }

    /// Instance weight, if set.
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Set the instance weight.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = Some(weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut v = SparseVector::with_capacity(2);
        assert!(v.is_empty());
        v.push(3, 1.5);
        v.push(10, -2.0);

        assert_eq!(v.len(), 2);
        assert_eq!(v.get(3), 1.5);
        assert_eq!(v.get(10), -2.0);
        assert_eq!(v.get(4), 0.0);
        assert_eq!(v.weight(), None);
    }

    #[test]
    fn test_weight_is_omitted_when_unset() {
        let mut v = SparseVector::default();
        v.push(0, 1.0);
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"indices":[0],"values":[1.0]}"#
        );

        v.set_weight(0.5);
        let back: SparseVector =
            serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back.weight(), Some(0.5));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = serde_json::from_str::<SparseVector>(r#"{"indices":[1,2],"values":[0.5]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("2 indices but 1 values"));
    }

    #[test]
    fn test_get_without_paired_value() {
        let v = SparseVector {
            indices: vec![1, 2],
            values: vec![0.5],
            weight: None,
        };
        assert_eq!(v.get(1), 0.5);
        assert_eq!(v.get(2), 0.0);
    }
}
