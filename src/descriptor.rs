//! Structural descriptors of dependency trees
//!
//! [`describe_tree`] walks a sentence post-order and returns its weight,
//! depth, dependency and hierarchical distances, and per-relation / per-tag
//! branching counts. Descriptors of many trees fold into a corpus total with
//! [`crate::merge::merge_all`].

use crate::merge::Merge;
use crate::tree::{Label, NodeIdx, Tree};
use rustc_hash::FxHashMap;

/// Branching counts for one relation or tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    /// Tokens carrying the label
    pub count: u64,
    /// Immediate children placed before their governor
    pub left: u64,
    /// Immediate children placed after their governor
    pub right: u64,
    /// Number of immediate children -> tokens with that many children
    pub branches: FxHashMap<usize, u64>,
    /// (governor tag, dependent tag) -> occurrences
    pub pos_pairs: FxHashMap<(Label, Label), u64>,
}

impl CategoryCounts {
    /// Counts contributed by a single token
    pub fn single(children: usize, left: u64, right: u64, pair: (Label, Label)) -> Self {
        let mut branches = FxHashMap::default();
        branches.insert(children, 1);
        let mut pos_pairs = FxHashMap::default();
        pos_pairs.insert(pair, 1);
        Self {
            count: 1,
            left,
            right,
            branches,
            pos_pairs,
        }
    }
}

impl Merge for CategoryCounts {
    fn merge_from(&mut self, other: Self) {
        self.count.merge_from(other.count);
        self.left.merge_from(other.left);
        self.right.merge_from(other.right);
        self.branches.merge_from(other.branches);
        self.pos_pairs.merge_from(other.pos_pairs);
    }
}

/// Measurements of a subtree. After merging several trees the scalar fields
/// hold sums over those trees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeDescriptor {
    pub weight: u64,
    pub depth: u64,
    pub dd: u64,
    pub hd: u64,
    pub ddsum: u64,
    pub hdsum: u64,
    pub mdd: f64,
    pub mhd: f64,
    pub rels: FxHashMap<Label, CategoryCounts>,
    pub postags: FxHashMap<Label, CategoryCounts>,
}

impl Merge for TreeDescriptor {
    fn merge_from(&mut self, other: Self) {
        self.weight.merge_from(other.weight);
        self.depth.merge_from(other.depth);
        self.dd.merge_from(other.dd);
        self.hd.merge_from(other.hd);
        self.ddsum.merge_from(other.ddsum);
        self.hdsum.merge_from(other.hdsum);
        self.mdd.merge_from(other.mdd);
        self.mhd.merge_from(other.mhd);
        self.rels.merge_from(other.rels);
        self.postags.merge_from(other.postags);
    }
}

/// Describe a whole sentence. `root_tag` is the governor tag recorded for
/// the root token's tag pair.
pub fn describe_tree(tree: &Tree, root_tag: Label) -> TreeDescriptor {
    describe_node(tree, tree.root_idx(), 0, root_tag)
}

/// Describe the subtree at `idx`, whose distance from the sentence root is
/// `root_distance` and whose governor has tag `governor`.
///
/// The walk is post-order over an explicit stack, so arbitrarily deep
/// sentences do not exhaust the call stack.
pub fn describe_node(
    tree: &Tree,
    idx: NodeIdx,
    root_distance: u64,
    governor: Label,
) -> TreeDescriptor {
    let mut results: Vec<Option<TreeDescriptor>> = vec![None; tree.len()];
    let mut stack = vec![Visit {
        idx,
        root_distance,
        governor,
        expanded: false,
    }];

    while let Some(visit) = stack.pop() {
        let node = tree.node(visit.idx);
        if !visit.expanded {
            stack.push(Visit {
                expanded: true,
                ..visit
            });
            stack.extend(node.children().iter().map(|&child| Visit {
                idx: child,
                root_distance: visit.root_distance + 1,
                governor: node.upos,
                expanded: false,
            }));
            continue;
        }

        // Children were finished before their parent was popped again
        let children: Vec<TreeDescriptor> = node
            .children()
            .iter()
            .filter_map(|&child| results[child].take())
            .collect();
        results[visit.idx] = Some(describe_one(tree, visit, children));
    }

    results[idx].take().unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
struct Visit {
    idx: NodeIdx,
    root_distance: u64,
    governor: Label,
    expanded: bool,
}

// Combine a node with the finished descriptors of its children
fn describe_one(tree: &Tree, visit: Visit, children: Vec<TreeDescriptor>) -> TreeDescriptor {
    let node = tree.node(visit.idx);
    let weight = 1 + children.iter().map(|c| c.weight).sum::<u64>();
    let depth = children.iter().map(|c| c.depth + 1).max().unwrap_or(0);

    // Heads never point at themselves in a validated tree
    let dd = if node.is_root() {
        0
    } else {
        (node.head.abs_diff(node.id) - 1) as u64
    };
    let hd = visit.root_distance;
    let ddsum = dd + children.iter().map(|c| c.ddsum).sum::<u64>();
    let hdsum = hd + children.iter().map(|c| c.hdsum).sum::<u64>();
    let (mdd, mhd) = if weight > 1 {
        let arcs = (weight - 1) as f64;
        (ddsum as f64 / arcs, hdsum as f64 / arcs)
    } else {
        (0.0, 0.0)
    };

    let (left, right) = tree
        .children(visit.idx)
        .fold((0, 0), |(left, right), child| {
            if child.id < node.id {
                (left + 1, right)
            } else {
                (left, right + 1)
            }
        });

    let own = CategoryCounts::single(
        node.children().len(),
        left,
        right,
        (visit.governor, node.upos),
    );
    let mut rels = FxHashMap::default();
    rels.insert(node.deprel, own.clone());
    let mut postags = FxHashMap::default();
    postags.insert(node.upos, own);

    for child in children {
        rels.merge_from(child.rels);
        postags.merge_from(child.postags);
    }

    TreeDescriptor {
        weight,
        depth,
        dd,
        hd,
        ddsum,
        hdsum,
        mdd,
        mhd,
        rels,
        postags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conllu::CoNLLUReader;
    use crate::tree::LabelPool;
    use approx::assert_abs_diff_eq;

    fn parse(conllu: &str, pool: &LabelPool) -> Vec<Tree> {
        CoNLLUReader::from_string(conllu, pool.clone())
            .collect::<Result<_, _>>()
            .unwrap()
    }

    /// "The big dog runs quickly ."
    ///
    /// runs(4) -> dog(3) -> The(1), big(2)
    ///         -> quickly(5)
    ///         -> .(6)
    const DOG_RUNS: &str = "1	The	the	DET	DT	_	3	det	_	_
2	big	big	ADJ	JJ	_	3	amod	_	_
3	dog	dog	NOUN	NN	_	4	nsubj	_	_
4	runs	run	VERB	VBZ	_	0	root	_	_
5	quickly	quickly	ADV	RB	_	4	advmod	_	_
6	.	.	PUNCT	.	_	4	punct	_	_
";

    #[test]
    fn test_single_node_tree() {
        let pool = LabelPool::new();
        let trees = parse("1	Dogs	dog	NOUN	NNS	_	0	root	_	_\n", &pool);
        let root_tag = pool.intern("ROOT");
        let d = describe_tree(&trees[0], root_tag);

        assert_eq!(d.weight, 1);
        assert_eq!(d.depth, 0);
        assert_eq!(d.mdd, 0.0);
        assert_eq!(d.mhd, 0.0);

        let root = &d.rels[&pool.intern("root")];
        assert_eq!(root.count, 1);
        assert_eq!((root.left, root.right), (0, 0));
        assert_eq!(root.branches.len(), 1);
        assert_eq!(root.branches[&0], 1);
        assert_eq!(root.pos_pairs.len(), 1);
        assert_eq!(root.pos_pairs[&(root_tag, pool.intern("NOUN"))], 1);
        assert_eq!(d.rels.len(), 1);
        assert_eq!(d.postags.len(), 1);
    }

    #[test]
    fn test_sentence_measurements() {
        let pool = LabelPool::new();
        let trees = parse(DOG_RUNS, &pool);
        let d = describe_tree(&trees[0], pool.intern("ROOT"));

        assert_eq!(d.weight, 6);
        assert_eq!(d.depth, 2);
        // dd: The 1, big 0, dog 0, runs 0, quickly 0, . 1
        assert_eq!(d.ddsum, 2);
        // hd: The 2, big 2, dog 1, runs 0, quickly 1, . 1
        assert_eq!(d.hdsum, 7);
        assert_abs_diff_eq!(d.mdd, 2.0 / 5.0);
        assert_abs_diff_eq!(d.mhd, 7.0 / 5.0);
    }

    #[test]
    fn test_branching_direction() {
        let pool = LabelPool::new();
        let trees = parse(DOG_RUNS, &pool);
        let d = describe_tree(&trees[0], pool.intern("ROOT"));

        let root = &d.rels[&pool.intern("root")];
        assert_eq!((root.left, root.right), (1, 2));
        assert_eq!(root.branches[&3], 1);

        let nsubj = &d.rels[&pool.intern("nsubj")];
        assert_eq!((nsubj.left, nsubj.right), (2, 0));
        assert_eq!(
            nsubj.pos_pairs[&(pool.intern("VERB"), pool.intern("NOUN"))],
            1
        );

        let det = &d.rels[&pool.intern("det")];
        assert_eq!((det.left, det.right), (0, 0));
        assert_eq!(det.branches[&0], 1);
        assert_eq!(
            det.pos_pairs[&(pool.intern("NOUN"), pool.intern("DET"))],
            1
        );
    }

    #[test]
    fn test_counts_cover_every_token() {
        let pool = LabelPool::new();
        let trees = parse(DOG_RUNS, &pool);
        let d = describe_tree(&trees[0], pool.intern("ROOT"));

        let rel_total: u64 = d.rels.values().map(|c| c.count).sum();
        let tag_total: u64 = d.postags.values().map(|c| c.count).sum();
        let branch_total: u64 = d.rels.values().flat_map(|c| c.branches.values()).sum();
        assert_eq!(rel_total, d.weight);
        assert_eq!(tag_total, d.weight);
        assert_eq!(branch_total, d.weight);

        // every child is counted once, on one side
        let sides: u64 = d.rels.values().map(|c| c.left + c.right).sum();
        assert_eq!(sides, d.weight - 1);
    }

    #[test]
    fn test_weight_and_depth_recursion() {
        let pool = LabelPool::new();
        let trees = parse(DOG_RUNS, &pool);
        let tree = &trees[0];
        let root_tag = pool.intern("ROOT");

        for idx in 0..tree.len() {
            let d = describe_node(tree, idx, 0, root_tag);
            let children: Vec<_> = tree
                .node(idx)
                .children()
                .iter()
                .map(|&c| describe_node(tree, c, 1, root_tag))
                .collect();
            assert!(d.weight >= 1);
            assert_eq!(d.weight, 1 + children.iter().map(|c| c.weight).sum::<u64>());
            assert_eq!(d.depth == 0, children.is_empty());
        }
    }

    #[test]
    fn test_deep_chain() {
        const N: usize = 20_000;
        let pool = LabelPool::new();
        let conllu: String = (1..=N)
            .map(|i| format!("{i}\tw\tw\tNOUN\t_\t_\t{}\tdep\t_\t_\n", i - 1))
            .collect();
        let trees = parse(&conllu, &pool);
        let d = describe_tree(&trees[0], pool.intern("ROOT"));

        assert_eq!(d.weight, N as u64);
        assert_eq!(d.depth, N as u64 - 1);
        // every token sits next to its head
        assert_eq!(d.ddsum, 0);
        // hd: 0 + 1 + ... + (N - 1)
        assert_eq!(d.hdsum, (N as u64 - 1) * N as u64 / 2);
        let dep = &d.rels[&pool.intern("dep")];
        assert_eq!(dep.count, N as u64);
        assert_eq!(dep.right, N as u64 - 1);
        assert_eq!(dep.branches[&1], N as u64 - 1);
        assert_eq!(dep.branches[&0], 1);
    }

    #[test]
    fn test_merge_two_trees() {
        let pool = LabelPool::new();
        let trees = parse(
            "1	Dogs	dog	NOUN	NNS	_	0	root	_	_

1	Cats	cat	NOUN	NNS	_	2	nsubj	_	_
2	sleep	sleep	VERB	VBP	_	0	root	_	_
",
            &pool,
        );
        let root_tag = pool.intern("ROOT");
        let merged: TreeDescriptor =
            crate::merge::merge_all(trees.iter().map(|t| describe_tree(t, root_tag)));

        assert_eq!(merged.weight, 3);
        assert_eq!(merged.depth, 1);
        let root = &merged.rels[&pool.intern("root")];
        assert_eq!(root.count, 2);
        assert_eq!(root.branches[&0], 1);
        assert_eq!(root.branches[&1], 1);
        assert_eq!(root.left, 1);
        assert_eq!(root.pos_pairs.len(), 2);
    }
}
