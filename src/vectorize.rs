//! Feature vectors from normalized records
//!
//! A record flattens depth-first in sorted key order, so two records with the
//! same shape produce vectors whose positions mean the same thing. Vectors of
//! all languages are checked against each other before they are handed out.

use crate::nested::Nested;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VectorError {
    #[error("no records to vectorize")]
    NoLanguages,
    #[error("language '{0}' appears more than once")]
    DuplicateLanguage(String),
    #[error("{language} has {found} features, {reference} has {expected}")]
    LengthMismatch {
        language: String,
        reference: String,
        expected: usize,
        found: usize,
    },
    #[error("{language} has feature '{found}' at position {position}, {reference} has '{expected}'")]
    FeatureMismatch {
        language: String,
        reference: String,
        position: usize,
        expected: String,
        found: String,
    },
}

/// Leaf values of a record in sorted key order
pub fn flatten(record: &Nested) -> Vec<f64> {
    let mut values = Vec::with_capacity(record.leaf_count());
    record.for_each_leaf(|_, value| values.push(value));
    values
}

/// Dotted paths of a record's leaves, aligned with [`flatten`]
pub fn feature_paths(record: &Nested) -> Vec<String> {
    let mut paths = Vec::with_capacity(record.leaf_count());
    record.for_each_leaf(|path, _| paths.push(path.join(".")));
    paths
}

/// Feature vectors of every language with the shared feature names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub features: Vec<String>,
    pub vectors: BTreeMap<String, Vec<f64>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Rescale every feature to [0, 1] across languages. Features that are
    /// constant across languages become 0.
    pub fn min_max_scale(&mut self) {
        for j in 0..self.features.len() {
            let (min, max) = self
                .vectors
                .values()
                .map(|v| v[j])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(x), hi.max(x))
                });
            let range = max - min;
            for vector in self.vectors.values_mut() {
                vector[j] = if range > 0.0 {
                    (vector[j] - min) / range
                } else {
                    0.0
                };
            }
        }
    }
}

/// Flatten normalized records and check that they all describe the same
/// features in the same order
pub fn vectorize(records: &[(String, Nested)]) -> Result<FeatureMatrix, VectorError> {
    let Some((reference, first)) = records.first() else {
        return Err(VectorError::NoLanguages);
    };
    let features = feature_paths(first);

    let mut vectors = BTreeMap::new();
    for (language, record) in records {
        let paths = feature_paths(record);
        if paths.len() != features.len() {
            return Err(VectorError::LengthMismatch {
                language: language.clone(),
                reference: reference.clone(),
                expected: features.len(),
                found: paths.len(),
            });
        }
        if let Some(position) = paths.iter().zip(&features).position(|(a, b)| a != b) {
            return Err(VectorError::FeatureMismatch {
                language: language.clone(),
                reference: reference.clone(),
                position,
                expected: features[position].clone(),
                found: paths[position].clone(),
            });
        }
        if vectors.insert(language.clone(), flatten(record)).is_some() {
            return Err(VectorError::DuplicateLanguage(language.clone()));
        }
    }

    log::debug!("{} vectors of {} features", vectors.len(), features.len());
    Ok(FeatureMatrix { features, vectors })
}
