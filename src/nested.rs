//! Nested numeric records
//!
//! Per-language records are trees of sorted string-keyed maps with numeric
//! leaves. They are what gets persisted, reconciled across languages, and
//! finally flattened into feature vectors, so the same type serves the
//! merge, the schema normalization and the vectorization.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A number or a sorted map of nested values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nested {
    Scalar(f64),
    Map(BTreeMap<String, Nested>),
}

/// A number and a map met at the same key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot merge a number with a map at '{path}'")]
pub struct MergeError {
    pub path: String,
}

impl Default for Nested {
    fn default() -> Self {
        Nested::Map(BTreeMap::new())
    }
}

impl From<f64> for Nested {
    fn from(value: f64) -> Self {
        Nested::Scalar(value)
    }
}

impl From<BTreeMap<String, Nested>> for Nested {
    fn from(map: BTreeMap<String, Nested>) -> Self {
        Nested::Map(map)
    }
}

impl<K: Into<String>, V: Into<Nested>> FromIterator<(K, V)> for Nested {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Nested::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Nested {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Nested::Scalar(value) => Some(*value),
            Nested::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Nested>> {
        match self {
            Nested::Map(map) => Some(map),
            Nested::Scalar(_) => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Nested>> {
        match self {
            Nested::Map(map) => Some(map),
            Nested::Scalar(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Nested> {
        self.as_map()?.get(key)
    }

    /// Follow a path of keys, e.g. `["rels", "nsubj", "r_freq"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&Nested> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Add `other` into `self`: numbers add up, maps are unioned and shared
    /// keys merged recursively.
    pub fn try_merge(&mut self, other: Nested) -> Result<(), MergeError> {
        self.merge_at(other, &mut Vec::new())
    }

    fn merge_at(&mut self, other: Nested, path: &mut Vec<String>) -> Result<(), MergeError> {
        match (self, other) {
            (Nested::Scalar(a), Nested::Scalar(b)) => {
                *a += b;
                Ok(())
            }
            (Nested::Map(into), Nested::Map(from)) => {
                for (key, value) in from {
                    match into.get_mut(&key) {
                        Some(existing) => {
                            path.push(key);
                            existing.merge_at(value, path)?;
                            path.pop();
                        }
                        None => {
                            into.insert(key, value);
                        }
                    }
                }
                Ok(())
            }
            _ => Err(MergeError {
                path: path.join("."),
            }),
        }
    }

    /// Merge any number of records, starting from the empty map
    pub fn merge_all<I>(items: I) -> Result<Nested, MergeError>
    where
        I: IntoIterator<Item = Nested>,
    {
        items.into_iter().try_fold(Nested::default(), |mut acc, item| {
            acc.try_merge(item)?;
            Ok(acc)
        })
    }

    /// Element-wise mean of several records. A key missing from a record
    /// counts as zero for that record.
    pub fn mean(records: &[Nested]) -> Result<Nested, MergeError> {
        let mut sum = Nested::merge_all(records.iter().cloned())?;
        if !records.is_empty() {
            sum.scale(1.0 / records.len() as f64);
        }
        Ok(sum)
    }

    /// Multiply every leaf by `factor`
    pub fn scale(&mut self, factor: f64) {
        match self {
            Nested::Scalar(value) => *value *= factor,
            Nested::Map(map) => map.values_mut().for_each(|v| v.scale(factor)),
        }
    }

    /// Number of numeric leaves
    pub fn leaf_count(&self) -> usize {
        match self {
            Nested::Scalar(_) => 1,
            Nested::Map(map) => map.values().map(Nested::leaf_count).sum(),
        }
    }

    /// Visit every leaf in sorted key order with its dotted path
    pub fn for_each_leaf(&self, mut f: impl FnMut(&[&str], f64)) {
        fn walk<'a>(node: &'a Nested, path: &mut Vec<&'a str>, f: &mut dyn FnMut(&[&str], f64)) {
            match node {
                Nested::Scalar(value) => f(path, *value),
                Nested::Map(map) => {
                    for (key, child) in map {
                        path.push(key);
                        walk(child, path, f);
                        path.pop();
                    }
                }
            }
        }
        walk(self, &mut Vec::new(), &mut f);
    }
}

/// Sorted union of the keys of several maps
pub fn keyset<'a, I>(maps: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a BTreeMap<String, Nested>>,
{
    maps.into_iter()
        .flat_map(|map| map.keys().cloned())
        .collect()
}
