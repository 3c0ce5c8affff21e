//! Consistency checks on corpus records
//!
//! A record is only persisted when its relative frequencies add up to one
//! in both groups, every category's left and right branching shares add up
//! to zero or one, and every relation's tag-pair shares add up to one.
//! Sums are compared after rounding to a fixed number of decimals.

use crate::nested::Nested;
use std::collections::BTreeMap;
use thiserror::Error;

/// The two category groups of a record
pub const GROUPS: [&str; 2] = ["rels", "postags"];

/// Corpus-level scalars of a record
pub const SCALARS: [&str; 4] = ["depth", "mdd", "mhd", "weight"];

/// Default rounding precision for the checks
pub const DEFAULT_DECIMALS: i32 = 15;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SanityError {
    #[error("record has no numeric field '{0}'")]
    MissingField(String),
    #[error("record has no map '{0}'")]
    MissingGroup(String),
    #[error("relative frequencies of {group} sum to {sum}, not 1")]
    FrequencySum { group: String, sum: f64 },
    #[error("left + right branching of {group}.{label} is {sum}, not 0 or 1")]
    BranchingSum { group: String, label: String, sum: f64 },
    #[error("tag-pair shares of rels.{label} sum to {sum}, not 1")]
    PairSum { label: String, sum: f64 },
}

/// Round like Python's `round(x, decimals)` for the magnitudes involved here
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Check that a record has the persisted shape: the corpus scalars and both
/// category groups.
pub fn check_shape(record: &Nested) -> Result<(), SanityError> {
    for key in SCALARS {
        record
            .get(key)
            .and_then(Nested::as_scalar)
            .ok_or_else(|| SanityError::MissingField(key.to_string()))?;
    }
    for group in GROUPS {
        group_of(record, group)?;
    }
    Ok(())
}

/// Run every consistency check on a freshly aggregated record
pub fn check(record: &Nested, decimals: i32) -> Result<(), SanityError> {
    check_shape(record)?;
    for group in GROUPS {
        let categories = group_of(record, group)?;
        check_frequencies(group, categories, decimals)?;
        check_branching(group, categories, decimals)?;
    }
    check_pairs(group_of(record, "rels")?, decimals)
}

fn group_of<'a>(record: &'a Nested, group: &str) -> Result<&'a BTreeMap<String, Nested>, SanityError> {
    record
        .get(group)
        .and_then(Nested::as_map)
        .ok_or_else(|| SanityError::MissingGroup(group.to_string()))
}

fn scalar(entry: &Nested, path: &[&str], context: &str) -> Result<f64, SanityError> {
    entry
        .get_path(path)
        .and_then(Nested::as_scalar)
        .ok_or_else(|| SanityError::MissingField(format!("{context}.{}", path.join("."))))
}

fn check_frequencies(
    group: &str,
    categories: &BTreeMap<String, Nested>,
    decimals: i32,
) -> Result<(), SanityError> {
    let mut sum = 0.0;
    for (label, entry) in categories {
        sum += scalar(entry, &["r_freq"], &format!("{group}.{label}"))?;
    }
    if round_to(sum, decimals) != 1.0 {
        return Err(SanityError::FrequencySum {
            group: group.to_string(),
            sum,
        });
    }
    Ok(())
}

fn check_branching(
    group: &str,
    categories: &BTreeMap<String, Nested>,
    decimals: i32,
) -> Result<(), SanityError> {
    for (label, entry) in categories {
        let context = format!("{group}.{label}");
        let sum = scalar(entry, &["branches", "left"], &context)?
            + scalar(entry, &["branches", "right"], &context)?;
        let rounded = round_to(sum, decimals);
        // A category with no dependents sums to 0
        if rounded != 0.0 && rounded != 1.0 {
            return Err(SanityError::BranchingSum {
                group: group.to_string(),
                label: label.clone(),
                sum,
            });
        }
    }
    Ok(())
}

fn check_pairs(rels: &BTreeMap<String, Nested>, decimals: i32) -> Result<(), SanityError> {
    for (label, entry) in rels {
        let Some(pairs) = entry.get("pos_pairs").and_then(Nested::as_map) else {
            return Err(SanityError::MissingGroup(format!("rels.{label}.pos_pairs")));
        };
        let sum: f64 = pairs.values().filter_map(Nested::as_scalar).sum();
        if round_to(sum, decimals) != 1.0 {
            return Err(SanityError::PairSum {
                label: label.clone(),
                sum,
            });
        }
    }
    Ok(())
}
