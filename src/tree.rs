//! Dependency tree data structures
//!
//! A tree is a flat arena of nodes in token order. Relation and tag labels
//! are interned in a [`LabelPool`] shared by every tree of a corpus, so the
//! statistics code can key its maps by symbol instead of by string.
//!
//! Trees are validated when they are built: every head must point at a
//! token of the same sentence (or at the root sentinel 0), there is exactly
//! one root, and every token is reachable from it.

use lasso::{Spur, ThreadedRodeo};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use thiserror::Error;

/// Interned relation or tag label
pub type Label = Spur;

/// CoNLL-U token identifier (1-based, 0 is the root sentinel)
pub type TokenId = usize;

/// Position of a node in [`Tree::nodes`]
pub type NodeIdx = usize;

/// Head value marking the sentence root
pub const ROOT_HEAD: TokenId = 0;

/// Shared interner for relation and tag labels
#[derive(Clone, Debug)]
pub struct LabelPool(Arc<ThreadedRodeo>);

impl Default for LabelPool {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelPool {
    pub fn new() -> Self {
        Self(Arc::new(ThreadedRodeo::new()))
    }

    #[inline]
    pub fn intern(&self, label: &str) -> Label {
        self.0.get_or_intern(label)
    }

    #[inline]
    pub fn resolve(&self, label: &Label) -> &str {
        self.0.resolve(label)
    }
}

/// Structural defects that make a sentence unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("sentence has no tokens")]
    Empty,
    #[error("token id 0 is reserved for the root")]
    ZeroId,
    #[error("token id {0} appears more than once")]
    DuplicateId(TokenId),
    #[error("token {id} is headed by {head}, which does not exist")]
    DanglingHead { id: TokenId, head: TokenId },
    #[error("sentence has no root token")]
    NoRoot,
    #[error("sentence has several roots: {0:?}")]
    MultipleRoots(Vec<TokenId>),
    #[error("token {0} is not reachable from the root (cycle)")]
    Cycle(TokenId),
}

/// A token in a dependency tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: TokenId,
    pub head: TokenId,
    pub deprel: Label,
    pub upos: Label,
    children: Vec<NodeIdx>,
}

impl Node {
    pub fn new(id: TokenId, head: TokenId, deprel: Label, upos: Label) -> Self {
        Self {
            id,
            head,
            deprel,
            upos,
            children: Vec::new(),
        }
    }

    /// Children in token order
    #[inline]
    pub fn children(&self) -> &[NodeIdx] {
        &self.children
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.head == ROOT_HEAD
    }
}

/// A dependency tree (sentence)
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeIdx,
}

impl Tree {
    /// Build a tree from its tokens, linking children to heads.
    ///
    /// Fails with a [`TreeError`] if the tokens do not form a single rooted
    /// tree.
    pub fn from_nodes(mut nodes: Vec<Node>) -> Result<Self, TreeError> {
        if nodes.is_empty() {
            return Err(TreeError::Empty);
        }

        let mut index: FxHashMap<TokenId, NodeIdx> = FxHashMap::default();
        for (idx, node) in nodes.iter().enumerate() {
            if node.id == ROOT_HEAD {
                return Err(TreeError::ZeroId);
            }
            if index.insert(node.id, idx).is_some() {
                return Err(TreeError::DuplicateId(node.id));
            }
        }

        let mut roots = Vec::new();
        let mut links = Vec::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if node.is_root() {
                roots.push(idx);
                continue;
            }
            match index.get(&node.head) {
                Some(&head_idx) if head_idx != idx => links.push((head_idx, idx)),
                Some(_) => return Err(TreeError::Cycle(node.id)),
                None => {
                    return Err(TreeError::DanglingHead {
                        id: node.id,
                        head: node.head,
                    });
                }
            }
        }

        let root = match roots.as_slice() {
            [] => return Err(TreeError::NoRoot),
            [root] => *root,
            _ => {
                return Err(TreeError::MultipleRoots(
                    roots.iter().map(|&idx| nodes[idx].id).collect(),
                ));
            }
        };

        for (head_idx, child_idx) in links {
            nodes[head_idx].children.push(child_idx);
        }
        for idx in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[idx].children);
            children.sort_by_key(|&c| nodes[c].id);
            nodes[idx].children = children;
        }

        let tree = Self { nodes, root };
        tree.check_reachable()?;
        Ok(tree)
    }

    // Every non-root token has a head, so an unreachable token means a cycle
    fn check_reachable(&self) -> Result<(), TreeError> {
        let mut seen: FxHashSet<NodeIdx> = FxHashSet::default();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            if seen.insert(idx) {
                stack.extend_from_slice(self.nodes[idx].children());
            }
        }
        match self.nodes.iter().enumerate().find(|(idx, _)| !seen.contains(idx)) {
            Some((_, node)) => Err(TreeError::Cycle(node.id)),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn root_idx(&self) -> NodeIdx {
        self.root
    }

    #[inline]
    pub fn root(&self) -> &Node {
        &self.nodes[self.root]
    }

    #[inline]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx]
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Get the children of a node
    pub fn children(&self, idx: NodeIdx) -> impl Iterator<Item = &Node> + '_ {
        self.nodes[idx].children.iter().map(|&c| &self.nodes[c])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a validated tree
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
