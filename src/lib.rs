//! Treestats: typological fingerprints from dependency treebanks
//!
//! Profiles the syntax of a language from a CoNLL-U corpus (dependency
//! distances, tree depth and weight, branching direction and branching
//! distributions per relation and tag) and turns the profiles of many
//! languages into comparable feature vectors.
//! Core implementation in Rust with optional Python bindings.

// Core modules (bottom-up)
pub mod conllu; // CoNLL-U file parsing
pub mod descriptor; // Per-tree structural descriptors
pub mod merge; // Additive merging of descriptors
pub mod nested; // Nested numeric records
pub mod stats; // Descriptive statistics
pub mod tree; // Dependency tree structure and label interning

// Corpus-level pipeline
pub mod aggregate; // Corpus profiles from merged descriptors
pub mod batch; // Directory-level driver (stats, vectorize)
pub mod config; // Run configuration
pub mod sanity; // Consistency checks before persistence
pub mod schema; // Cross-language schema normalization
pub mod vectorize; // Flattening records into feature vectors

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use aggregate::{CategoryProfile, CorpusProfile, aggregate};
pub use batch::{BatchReport, CorpusError, VectorizeReport, run_stats, run_vectorize};
pub use config::{Config, Scaling};
pub use conllu::{CoNLLUReader, ParseError, read_treebank};
pub use descriptor::{TreeDescriptor, describe_tree};
pub use merge::{Merge, merge_all};
pub use nested::Nested;
pub use schema::{Schema, normalize};
pub use tree::{Label, LabelPool, Node, TokenId, Tree};
pub use vectorize::{FeatureMatrix, vectorize};
