//! Additive recursive merge
//!
//! Folding per-tree statistics into a corpus aggregate is a merge where
//! numbers add up and maps are unioned key by key, recursing into values
//! present on both sides. The operation is associative and commutative, so
//! trees can be folded in any order.
//!
//! [`Merge`] covers the statically typed structures. The dynamically shaped
//! records in [`crate::nested`] merge through [`crate::nested::Nested::try_merge`],
//! which can fail when a number meets a map.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::btree_map;
use std::collections::hash_map;
use std::hash::{BuildHasher, Hash};

/// Additive in-place merge
pub trait Merge {
    fn merge_from(&mut self, other: Self);
}

macro_rules! impl_merge_by_addition {
    ($($t:ty),*) => {
        $(
            impl Merge for $t {
                #[inline]
                fn merge_from(&mut self, other: Self) {
                    *self += other;
                }
            }
        )*
    };
}

impl_merge_by_addition!(u32, u64, usize, i64, f64);

impl<K, V, S> Merge for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: Merge,
    S: BuildHasher,
{
    fn merge_from(&mut self, other: Self) {
        for (key, value) in other {
            match self.entry(key) {
                hash_map::Entry::Occupied(mut entry) => entry.get_mut().merge_from(value),
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
    }
}

impl<K: Ord, V: Merge> Merge for BTreeMap<K, V> {
    fn merge_from(&mut self, other: Self) {
        for (key, value) in other {
            match self.entry(key) {
                btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge_from(value),
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
    }
}

/// Merge any number of values into one, starting from the empty value
pub fn merge_all<T, I>(items: I) -> T
where
    T: Merge + Default,
    I: IntoIterator<Item = T>,
{
    items.into_iter().fold(T::default(), |mut acc, item| {
        acc.merge_from(item);
        acc
    })
}
