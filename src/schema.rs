//! Reconciling records of several languages into one feature schema
//!
//! Languages use different relation and tag inventories. Before records can
//! be compared, every record gets the union of all labels (missing labels
//! become zero records) and every relation entry gets the union of all tag
//! pairs (missing pairs become zeros). The result does not depend on the
//! order in which languages are given.

use crate::aggregate::CategoryProfile;
use crate::nested::{Nested, keyset};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const POS_PAIRS: &str = "pos_pairs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{language}: record has no map '{group}'")]
    MissingGroup { language: String, group: String },
    #[error("{language}: '{path}' is not a map")]
    NotAMap { language: String, path: String },
    #[error("{language}: keys of '{group}' differ from the shared schema (missing {missing:?}, unexpected {unexpected:?})")]
    KeyMismatch {
        language: String,
        group: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Label and tag-pair inventories shared by all languages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub rels: BTreeSet<String>,
    pub postags: BTreeSet<String>,
    pub pos_pairs: BTreeSet<String>,
}

impl Schema {
    /// Union the inventories of every record
    pub fn collect(records: &[(String, Nested)]) -> Result<Self, SchemaError> {
        let mut rels = Vec::with_capacity(records.len());
        let mut postags = Vec::with_capacity(records.len());
        for (language, record) in records {
            rels.push(group(language, record, "rels")?);
            postags.push(group(language, record, "postags")?);
        }
        let pairs = rels
            .iter()
            .flat_map(|entries| entries.values())
            .filter_map(|entry| entry.get(POS_PAIRS).and_then(Nested::as_map));

        Ok(Schema {
            pos_pairs: keyset(pairs),
            rels: keyset(rels.iter().copied()),
            postags: keyset(postags),
        })
    }

    /// A copy of `record` filled out to this schema
    pub fn apply(&self, language: &str, record: &Nested) -> Result<Nested, SchemaError> {
        let mut record = record.clone();

        let rels = group_mut(language, &mut record, "rels")?;
        for label in &self.rels {
            rels.entry(label.clone())
                .or_insert_with(|| CategoryProfile::zero(Some(&self.pos_pairs)).to_nested());
        }
        for (label, entry) in rels.iter_mut() {
            let path = format!("rels.{label}");
            let entry = entry.as_map_mut().ok_or_else(|| not_a_map(language, &path))?;
            let pairs = entry
                .entry(POS_PAIRS.to_string())
                .or_default()
                .as_map_mut()
                .ok_or_else(|| not_a_map(language, &format!("{path}.{POS_PAIRS}")))?;
            for pair in &self.pos_pairs {
                pairs.entry(pair.clone()).or_insert(Nested::Scalar(0.0));
            }
        }

        let postags = group_mut(language, &mut record, "postags")?;
        for label in &self.postags {
            postags
                .entry(label.clone())
                .or_insert_with(|| CategoryProfile::zero(None::<&[String]>).to_nested());
        }

        self.verify(language, &record)?;
        Ok(record)
    }

    /// Check that a record's label sets and every relation's pair set equal
    /// this schema's
    pub fn verify(&self, language: &str, record: &Nested) -> Result<(), SchemaError> {
        let rels = group(language, record, "rels")?;
        compare(language, "rels", rels.keys(), &self.rels)?;
        compare(
            language,
            "postags",
            group(language, record, "postags")?.keys(),
            &self.postags,
        )?;
        for (label, entry) in rels {
            let path = format!("rels.{label}.{POS_PAIRS}");
            let pairs = entry
                .get(POS_PAIRS)
                .and_then(Nested::as_map)
                .ok_or_else(|| not_a_map(language, &path))?;
            compare(language, &path, pairs.keys(), &self.pos_pairs)?;
        }
        Ok(())
    }
}

/// Bring every record to the shared schema. Records come back in input
/// order; the input is left untouched.
pub fn normalize(records: &[(String, Nested)]) -> Result<Vec<(String, Nested)>, SchemaError> {
    let schema = Schema::collect(records)?;
    log::debug!(
        "schema: {} relations, {} tags, {} tag pairs",
        schema.rels.len(),
        schema.postags.len(),
        schema.pos_pairs.len()
    );
    records
        .iter()
        .map(|(language, record)| Ok((language.clone(), schema.apply(language, record)?)))
        .collect()
}

fn group<'a>(
    language: &str,
    record: &'a Nested,
    name: &str,
) -> Result<&'a BTreeMap<String, Nested>, SchemaError> {
    record
        .get(name)
        .and_then(Nested::as_map)
        .ok_or_else(|| missing_group(language, name))
}

fn group_mut<'a>(
    language: &str,
    record: &'a mut Nested,
    name: &str,
) -> Result<&'a mut BTreeMap<String, Nested>, SchemaError> {
    record
        .as_map_mut()
        .and_then(|map| map.get_mut(name))
        .and_then(Nested::as_map_mut)
        .ok_or_else(|| missing_group(language, name))
}

fn missing_group(language: &str, group: &str) -> SchemaError {
    SchemaError::MissingGroup {
        language: language.to_string(),
        group: group.to_string(),
    }
}

fn not_a_map(language: &str, path: &str) -> SchemaError {
    SchemaError::NotAMap {
        language: language.to_string(),
        path: path.to_string(),
    }
}

fn compare<'a>(
    language: &str,
    group: &str,
    keys: impl Iterator<Item = &'a String>,
    expected: &BTreeSet<String>,
) -> Result<(), SchemaError> {
    let found: BTreeSet<&String> = keys.collect();
    let missing: Vec<String> = expected
        .iter()
        .filter(|key| !found.contains(key))
        .cloned()
        .collect();
    let unexpected: Vec<String> = found
        .iter()
        .filter(|key| !expected.contains(**key))
        .map(|key| (*key).clone())
        .collect();
    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::KeyMismatch {
            language: language.to_string(),
            group: group.to_string(),
            missing,
            unexpected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::conllu::CoNLLUReader;
    use crate::tree::LabelPool;
    use proptest::prelude::*;

    const BARKS: &str = "1	Dogs	dog	NOUN	NNS	_	2	nsubj	_	_
2	bark	bark	VERB	VBP	_	0	root	_	_
";

    const GO_HOME: &str = "1	Go	go	VERB	VB	_	0	root	_	_
2	home	home	ADV	RB	_	1	advmod	_	_
";

    const THE_CAT: &str = "1	The	the	DET	DT	_	2	det	_	_
2	cat	cat	NOUN	NN	_	3	nsubj	_	_
3	sleeps	sleep	VERB	VBZ	_	0	root	_	_
";

    fn record(conllu: &str) -> Nested {
        let pool = LabelPool::new();
        let trees: Vec<_> = CoNLLUReader::from_string(conllu, pool.clone())
            .collect::<Result<_, _>>()
            .unwrap();
        let root_tag = pool.intern("ROOT");
        aggregate(&trees, &pool, root_tag).unwrap().to_record()
    }

    fn languages() -> Vec<(String, Nested)> {
        vec![
            ("barks".to_string(), record(BARKS)),
            ("go_home".to_string(), record(GO_HOME)),
            ("the_cat".to_string(), record(THE_CAT)),
        ]
    }

    #[test]
    fn test_collect() {
        let schema = Schema::collect(&languages()).unwrap();
        let rels: Vec<_> = schema.rels.iter().map(String::as_str).collect();
        let tags: Vec<_> = schema.postags.iter().map(String::as_str).collect();
        let pairs: Vec<_> = schema.pos_pairs.iter().map(String::as_str).collect();
        assert_eq!(rels, ["advmod", "det", "nsubj", "root"]);
        assert_eq!(tags, ["ADV", "DET", "NOUN", "VERB"]);
        assert_eq!(pairs, ["NOUN>DET", "ROOT>VERB", "VERB>ADV", "VERB>NOUN"]);
    }

    #[test]
    fn test_missing_relation_is_zero_record() {
        let records = languages();
        let schema = Schema::collect(&records).unwrap();
        let normalized = normalize(&records).unwrap();

        let go_home = &normalized[1].1;
        assert_eq!(normalized[1].0, "go_home");
        let nsubj = go_home.get_path(&["rels", "nsubj"]).unwrap();
        assert_eq!(
            nsubj,
            &CategoryProfile::zero(Some(&schema.pos_pairs)).to_nested()
        );

        let noun = go_home.get_path(&["postags", "NOUN"]).unwrap();
        assert_eq!(noun, &CategoryProfile::zero(None::<&[String]>).to_nested());
    }

    #[test]
    fn test_missing_pairs_are_zero_filled() {
        let normalized = normalize(&languages()).unwrap();
        let barks = &normalized[0].1;

        let root_pairs = barks
            .get_path(&["rels", "root", "pos_pairs"])
            .and_then(Nested::as_map)
            .unwrap();
        assert_eq!(root_pairs.len(), 4);
        assert_eq!(root_pairs["ROOT>VERB"], Nested::Scalar(1.0));
        assert_eq!(root_pairs["VERB>ADV"], Nested::Scalar(0.0));
        assert_eq!(root_pairs["NOUN>DET"], Nested::Scalar(0.0));
    }

    #[test]
    fn test_normalized_records_share_shape() {
        let normalized = normalize(&languages()).unwrap();
        let shapes: Vec<Vec<String>> = normalized
            .iter()
            .map(|(_, record)| {
                let mut paths = Vec::new();
                record.for_each_leaf(|path, _| paths.push(path.join(".")));
                paths
            })
            .collect();
        assert!(shapes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_input_untouched() {
        let records = languages();
        let before = records.clone();
        normalize(&records).unwrap();
        assert_eq!(records, before);
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let records = languages();
        let schema = Schema::collect(&records).unwrap();
        match schema.verify("barks", &records[0].1) {
            Err(SchemaError::KeyMismatch {
                language,
                group,
                missing,
                unexpected,
            }) => {
                assert_eq!(language, "barks");
                assert_eq!(group, "rels");
                assert_eq!(missing, ["advmod", "det"]);
                assert!(unexpected.is_empty());
            }
            other => panic!("expected KeyMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_records() {
        let no_rels: Nested = serde_json::from_str(r#"{"postags": {}}"#).unwrap();
        assert_eq!(
            normalize(&[("x".to_string(), no_rels)]).unwrap_err(),
            SchemaError::MissingGroup {
                language: "x".to_string(),
                group: "rels".to_string()
            }
        );

        let scalar_entry: Nested =
            serde_json::from_str(r#"{"rels": {"root": 1}, "postags": {}}"#).unwrap();
        assert!(matches!(
            normalize(&[("y".to_string(), scalar_entry)]),
            Err(SchemaError::NotAMap { ref path, .. }) if path == "rels.root"
        ));
    }

    proptest! {
        #[test]
        fn prop_order_independent(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
            let records = languages();
            let shuffled: Vec<_> = order.iter().map(|&i| records[i].clone()).collect();

            let expected: BTreeMap<_, _> = normalize(&records).unwrap().into_iter().collect();
            let actual: BTreeMap<_, _> = normalize(&shuffled).unwrap().into_iter().collect();
            prop_assert_eq!(expected, actual);
        }
    }
}
