//! Corpus-level aggregation
//!
//! Folds the descriptors of every tree in a corpus and turns the merged
//! counts into a [`CorpusProfile`]: corpus means, and for every relation and
//! tag its relative frequency, directional branching ratios and a summary of
//! its branching distribution.

use crate::descriptor::{CategoryCounts, TreeDescriptor, describe_tree};
use crate::merge::merge_all;
use crate::nested::Nested;
use crate::stats;
use crate::tree::{Label, LabelPool, Tree};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Separator between governor and dependent tag in tag-pair keys
pub const PAIR_SEPARATOR: char = '>';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("corpus contains no trees")]
    EmptyCorpus,
}

/// Summary of a category's branching histogram
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchingProfile {
    pub anova: f64,
    pub entropy: f64,
    pub kurtosis: f64,
    pub left: f64,
    pub mean: f64,
    pub median: f64,
    pub r_branch_patns: f64,
    pub range: f64,
    pub right: f64,
    pub skew: f64,
    pub std: f64,
    pub var: f64,
}

impl BranchingProfile {
    /// Describe a histogram (child count -> tokens) against the group's
    /// reference proportions.
    ///
    /// Location and spread are computed on proportions, shape on raw counts.
    pub fn describe(histogram: &FxHashMap<usize, u64>, reference: &[f64]) -> Self {
        let (dist, rdist) = distributions(histogram);
        Self {
            anova: stats::f_oneway(&[reference, &rdist]),
            entropy: stats::entropy(&rdist),
            kurtosis: stats::kurtosis(&dist),
            mean: stats::mean(&rdist),
            median: stats::median(&rdist),
            range: stats::iqr(&rdist),
            skew: stats::skewness(&dist),
            std: stats::std_dev(&rdist),
            var: stats::variance(&rdist),
            ..Self::default()
        }
    }

    fn to_nested(&self) -> Nested {
        [
            ("anova", self.anova),
            ("entropy", self.entropy),
            ("kurtosis", self.kurtosis),
            ("left", self.left),
            ("mean", self.mean),
            ("median", self.median),
            ("r_branch_patns", self.r_branch_patns),
            ("range", self.range),
            ("right", self.right),
            ("skew", self.skew),
            ("std", self.std),
            ("var", self.var),
        ]
        .into_iter()
        .collect()
    }
}

/// Profile of one relation or tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryProfile {
    /// Share of all tokens carrying this label
    pub r_freq: f64,
    pub branches: BranchingProfile,
    /// Share of each "GOV>DEP" tag pair among the label's tokens. Only
    /// relations carry pairs.
    pub pos_pairs: Option<BTreeMap<String, f64>>,
}

impl CategoryProfile {
    /// Canonical placeholder for a label a corpus never uses. Relations get
    /// a zero for every pair in `pairs`; tags pass `None`.
    pub fn zero<'a>(pairs: Option<impl IntoIterator<Item = &'a String>>) -> Self {
        Self {
            pos_pairs: pairs.map(|pairs| pairs.into_iter().map(|p| (p.clone(), 0.0)).collect()),
            ..Self::default()
        }
    }

    pub fn to_nested(&self) -> Nested {
        let mut map = BTreeMap::new();
        map.insert("branches".to_string(), self.branches.to_nested());
        map.insert("r_freq".to_string(), Nested::Scalar(self.r_freq));
        if let Some(pairs) = &self.pos_pairs {
            map.insert(
                "pos_pairs".to_string(),
                pairs.iter().map(|(k, &v)| (k.clone(), v)).collect(),
            );
        }
        Nested::Map(map)
    }
}

/// Aggregate statistics of one corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusProfile {
    pub trees: usize,
    pub mdd: f64,
    pub mhd: f64,
    pub depth: f64,
    pub weight: f64,
    pub rels: BTreeMap<String, CategoryProfile>,
    pub postags: BTreeMap<String, CategoryProfile>,
}

impl CorpusProfile {
    /// The persisted record. The tree count is not part of the feature
    /// schema.
    pub fn to_record(&self) -> Nested {
        let group = |profiles: &BTreeMap<String, CategoryProfile>| -> Nested {
            profiles
                .iter()
                .map(|(label, profile)| (label.clone(), profile.to_nested()))
                .collect()
        };
        let mut map = BTreeMap::new();
        map.insert("depth".to_string(), Nested::Scalar(self.depth));
        map.insert("mdd".to_string(), Nested::Scalar(self.mdd));
        map.insert("mhd".to_string(), Nested::Scalar(self.mhd));
        map.insert("postags".to_string(), group(&self.postags));
        map.insert("rels".to_string(), group(&self.rels));
        map.insert("weight".to_string(), Nested::Scalar(self.weight));
        Nested::Map(map)
    }
}

/// Describe and merge every tree of a corpus
pub fn corpus_counts(trees: &[Tree], root_tag: Label) -> Result<TreeDescriptor, AggregateError> {
    if trees.is_empty() {
        return Err(AggregateError::EmptyCorpus);
    }
    Ok(merge_all(trees.iter().map(|tree| describe_tree(tree, root_tag))))
}

/// Aggregate a corpus into its profile
pub fn aggregate(
    trees: &[Tree],
    pool: &LabelPool,
    root_tag: Label,
) -> Result<CorpusProfile, AggregateError> {
    let merged = corpus_counts(trees, root_tag)?;
    Ok(profile(&merged, trees.len(), pool))
}

/// Turn merged counts of `size` trees into a profile
pub fn profile(merged: &TreeDescriptor, size: usize, pool: &LabelPool) -> CorpusProfile {
    let trees = size as f64;
    let tokens = merged.weight as f64;
    CorpusProfile {
        trees: size,
        mdd: merged.mdd / trees,
        mhd: merged.mhd / trees,
        depth: merged.depth as f64 / trees,
        weight: tokens / trees,
        rels: profile_group(&merged.rels, tokens, pool, true),
        postags: profile_group(&merged.postags, tokens, pool, false),
    }
}

fn profile_group(
    group: &FxHashMap<Label, CategoryCounts>,
    tokens: f64,
    pool: &LabelPool,
    with_pairs: bool,
) -> BTreeMap<String, CategoryProfile> {
    let reference_histogram: FxHashMap<usize, u64> =
        merge_all(group.values().map(|counts| counts.branches.clone()));
    let (_, reference) = distributions(&reference_histogram);
    let branch_patterns: usize = group.values().map(|counts| counts.branches.len()).sum();

    group
        .iter()
        .map(|(label, counts)| {
            let mut branches = BranchingProfile::describe(&counts.branches, &reference);
            branches.r_branch_patns = counts.branches.len() as f64 / branch_patterns as f64;
            (branches.left, branches.right) = branching_ratios(counts.left, counts.right);

            let profile = CategoryProfile {
                r_freq: counts.count as f64 / tokens,
                branches,
                pos_pairs: with_pairs.then(|| pair_shares(&counts.pos_pairs, pool)),
            };
            (pool.resolve(label).to_string(), profile)
        })
        .collect()
}

/// Left and right shares of a category's children, 0 for a side never used
pub fn branching_ratios(left: u64, right: u64) -> (f64, f64) {
    let total = (left + right) as f64;
    let share = |side: u64| if side > 0 { side as f64 / total } else { 0.0 };
    (share(left), share(right))
}

fn pair_shares(pairs: &FxHashMap<(Label, Label), u64>, pool: &LabelPool) -> BTreeMap<String, f64> {
    let total: u64 = pairs.values().sum();
    let mut shares = BTreeMap::new();
    for ((gov, dep), &n) in pairs {
        let key = format!("{}{PAIR_SEPARATOR}{}", pool.resolve(gov), pool.resolve(dep));
        *shares.entry(key).or_insert(0.0) += n as f64 / total as f64;
    }
    shares
}

/// Raw counts and proportions of a histogram, ordered by child count
fn distributions(histogram: &FxHashMap<usize, u64>) -> (Vec<f64>, Vec<f64>) {
    let mut entries: Vec<(usize, u64)> = histogram.iter().map(|(&k, &v)| (k, v)).collect();
    entries.sort_unstable_by_key(|&(k, _)| k);

    let total: u64 = entries.iter().map(|&(_, v)| v).sum();
    let dist: Vec<f64> = entries.iter().map(|&(_, v)| v as f64).collect();
    let rdist = if total > 0 {
        dist.iter().map(|&v| v / total as f64).collect()
    } else {
        vec![0.0; dist.len()]
    };
    (dist, rdist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conllu::CoNLLUReader;
    use approx::assert_abs_diff_eq;

    const CORPUS: &str = "1	The	the	DET	DT	_	2	det	_	_
2	dog	dog	NOUN	NN	_	3	nsubj	_	_
3	runs	run	VERB	VBZ	_	0	root	_	_
4	.	.	PUNCT	.	_	3	punct	_	_

1	Cats	cat	NOUN	NNS	_	2	nsubj	_	_
2	sleep	sleep	VERB	VBP	_	0	root	_	_

1	Stop	stop	VERB	VB	_	0	root	_	_
2	it	it	PRON	PRP	_	1	obj	_	_
";

    fn corpus_profile(conllu: &str) -> CorpusProfile {
        let pool = LabelPool::new();
        let trees: Vec<Tree> = CoNLLUReader::from_string(conllu, pool.clone())
            .collect::<Result<_, _>>()
            .unwrap();
        let root_tag = pool.intern("ROOT");
        aggregate(&trees, &pool, root_tag).unwrap()
    }

    #[test]
    fn test_single_node_corpus() {
        let profile = corpus_profile("1	Dogs	dog	NOUN	NNS	_	0	root	_	_\n");

        assert_eq!(profile.trees, 1);
        assert_eq!(profile.weight, 1.0);
        assert_eq!(profile.depth, 0.0);
        assert_eq!(profile.mdd, 0.0);
        assert_eq!(profile.mhd, 0.0);

        let root = &profile.rels["root"];
        assert_eq!(root.r_freq, 1.0);
        assert_eq!(root.branches.left, 0.0);
        assert_eq!(root.branches.right, 0.0);
        assert_eq!(root.branches.r_branch_patns, 1.0);
        let pairs = root.pos_pairs.as_ref().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs["ROOT>NOUN"], 1.0);
        assert!(profile.postags["NOUN"].pos_pairs.is_none());
    }

    #[test]
    fn test_corpus_means() {
        let profile = corpus_profile(CORPUS);

        assert_eq!(profile.trees, 3);
        // 8 tokens over 3 trees
        assert_abs_diff_eq!(profile.weight, 8.0 / 3.0);
        // depths 2, 1, 1
        assert_abs_diff_eq!(profile.depth, 4.0 / 3.0);
        // mdd per tree: (0 + 0 + 0) / 3, 0, 0
        assert_abs_diff_eq!(profile.mdd, 0.0);
        // mhd per tree: (2 + 1 + 1) / 3, 1, 1
        assert_abs_diff_eq!(profile.mhd, (4.0 / 3.0 + 2.0) / 3.0);
    }

    #[test]
    fn test_relative_frequencies_sum_to_one() {
        let profile = corpus_profile(CORPUS);

        let rels: f64 = profile.rels.values().map(|p| p.r_freq).sum();
        let tags: f64 = profile.postags.values().map(|p| p.r_freq).sum();
        assert_abs_diff_eq!(rels, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(tags, 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(profile.rels["root"].r_freq, 3.0 / 8.0);
        assert_abs_diff_eq!(profile.postags["NOUN"].r_freq, 2.0 / 8.0);
    }

    #[test]
    fn test_branching_ratios() {
        let profile = corpus_profile(CORPUS);

        // roots: runs has dog left and . right, sleep has Cats left, Stop has it right
        let root = &profile.rels["root"].branches;
        assert_abs_diff_eq!(root.left, 0.5);
        assert_abs_diff_eq!(root.right, 0.5);

        let nsubj = &profile.rels["nsubj"].branches;
        assert_abs_diff_eq!(nsubj.left, 1.0);
        assert_abs_diff_eq!(nsubj.right, 0.0);

        for category in profile.rels.values().chain(profile.postags.values()) {
            let sum = category.branches.left + category.branches.right;
            assert!(sum == 0.0 || (sum - 1.0).abs() < 1e-15);
        }

        assert_eq!(branching_ratios(0, 0), (0.0, 0.0));
        assert_eq!(branching_ratios(3, 1), (0.75, 0.25));
    }

    #[test]
    fn test_branching_distribution() {
        let profile = corpus_profile(CORPUS);

        // root branches: {1: 2, 2: 1} -> proportions [2/3, 1/3]
        let root = &profile.rels["root"].branches;
        assert_abs_diff_eq!(root.mean, 0.5);
        assert_abs_diff_eq!(root.median, 0.5);
        assert_abs_diff_eq!(root.var, 1.0 / 36.0, epsilon = 1e-15);
        assert_abs_diff_eq!(root.range, 1.0 / 6.0, epsilon = 1e-15);
        let p: [f64; 2] = [2.0 / 3.0, 1.0 / 3.0];
        let h = -(p[0] * p[0].ln() + p[1] * p[1].ln());
        assert_abs_diff_eq!(root.entropy, h, epsilon = 1e-12);
        // two raw counts: skew 0, kurtosis -2
        assert_abs_diff_eq!(root.skew, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(root.kurtosis, -2.0, epsilon = 1e-12);

        // det never branches: single proportion 1.0
        let det = &profile.rels["det"].branches;
        assert_eq!(det.mean, 1.0);
        assert_eq!(det.std, 0.0);
        assert_eq!(det.entropy, 0.0);
    }

    #[test]
    fn test_anova_against_reference() {
        let profile = corpus_profile(CORPUS);

        // reference over all rels: {0: 4, 1: 3, 2: 1} of 8 tokens
        let reference = [4.0 / 8.0, 3.0 / 8.0, 1.0 / 8.0];
        let root = [2.0 / 3.0, 1.0 / 3.0];
        let expected = stats::f_oneway(&[&reference, &root]);
        assert_abs_diff_eq!(profile.rels["root"].branches.anova, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_branch_pattern_shares() {
        let profile = corpus_profile(CORPUS);

        // rels patterns: det{0} nsubj{0,1} root{1,2} punct{0} obj{0} -> 7
        assert_abs_diff_eq!(profile.rels["root"].branches.r_branch_patns, 2.0 / 7.0);
        assert_abs_diff_eq!(profile.rels["det"].branches.r_branch_patns, 1.0 / 7.0);
    }

    #[test]
    fn test_pair_shares() {
        let profile = corpus_profile(CORPUS);

        let root_pairs = profile.rels["root"].pos_pairs.as_ref().unwrap();
        assert_eq!(root_pairs.len(), 1);
        assert_abs_diff_eq!(root_pairs["ROOT>VERB"], 1.0);

        let nsubj_pairs = profile.rels["nsubj"].pos_pairs.as_ref().unwrap();
        assert_abs_diff_eq!(nsubj_pairs["VERB>NOUN"], 1.0);
        let total: f64 = nsubj_pairs.values().sum();
        assert_abs_diff_eq!(total, 1.0);
    }

    #[test]
    fn test_empty_corpus() {
        let pool = LabelPool::new();
        let root_tag = pool.intern("ROOT");
        assert_eq!(
            aggregate(&[], &pool, root_tag).unwrap_err(),
            AggregateError::EmptyCorpus
        );
    }

    #[test]
    fn test_record_shape() {
        let record = corpus_profile(CORPUS).to_record();
        let keys: Vec<_> = record.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["depth", "mdd", "mhd", "postags", "rels", "weight"]);

        let branches = record
            .get_path(&["rels", "root", "branches"])
            .and_then(Nested::as_map)
            .unwrap();
        assert_eq!(branches.len(), 12);
        assert!(record.get_path(&["rels", "root", "pos_pairs", "ROOT>VERB"]).is_some());
        assert!(record.get_path(&["postags", "VERB", "pos_pairs"]).is_none());
        assert!(record.get("trees").is_none());
    }

    #[test]
    fn test_zero_record() {
        let pairs = vec!["VERB>NOUN".to_string(), "ROOT>VERB".to_string()];
        let zero = CategoryProfile::zero(Some(&pairs)).to_nested();

        assert_eq!(zero.leaf_count(), 12 + 1 + 2);
        zero.for_each_leaf(|_, value| assert_eq!(value, 0.0));

        let tag_zero = CategoryProfile::zero(None::<&[String]>).to_nested();
        assert!(tag_zero.get("pos_pairs").is_none());
        assert_eq!(tag_zero.leaf_count(), 13);
    }
}
