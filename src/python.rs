//! Python bindings for treestats
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::batch::{CorpusError, PersistError, checked_profile, profile_corpora};
use crate::config::Config;
use crate::schema::{SchemaError, normalize};
use crate::vectorize::{VectorError, vectorize};

/// Convert CorpusError to Python exception
impl From<CorpusError> for PyErr {
    fn from(err: CorpusError) -> PyErr {
        match err {
            CorpusError::Persist(PersistError::Io { path, source }) => {
                PyIOError::new_err(format!("Failed to open file {}: {}", path.display(), source))
            }
            CorpusError::Parse(e) => match e.kind {
                crate::conllu::ParseErrorKind::Io(source) => PyIOError::new_err(source.to_string()),
                kind => PyValueError::new_err(format!(
                    "Parse error at line {}: {}",
                    e.line_num, kind
                )),
            },
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

impl From<SchemaError> for PyErr {
    fn from(err: SchemaError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

impl From<VectorError> for PyErr {
    fn from(err: VectorError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Profile a single CoNLL-U corpus.
///
/// Args:
///     path: Path to a CoNLL-U file (.conllu or .conllu.gz)
///
/// Returns:
///     The corpus record as a JSON string
///
/// Raises:
///     IOError: If the file cannot be read
///     ValueError: If the corpus cannot be parsed or fails the sanity checks
#[pyfunction]
fn corpus_profile(path: &str) -> PyResult<String> {
    let record = checked_profile(&PathBuf::from(path), &Config::default())?;
    serde_json::to_string(&record).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Feature vectors for several languages.
///
/// Every corpus is profiled, the records are normalized against each other
/// and flattened, so all vectors have the same length and feature order.
/// A corpus that cannot be read or fails the sanity checks is logged and
/// left out of the result.
///
/// Args:
///     corpora: Mapping of language name to CoNLL-U path
///
/// Returns:
///     Mapping of language name to feature vector
///
/// Raises:
///     ValueError: If no corpus could be profiled
///
/// Example:
///     >>> treestats.fingerprints({"en": "en_ewt.conllu", "de": "de_gsd.conllu"})
#[pyfunction]
fn fingerprints(corpora: HashMap<String, String>) -> PyResult<HashMap<String, Vec<f64>>> {
    let config = Config::default();
    let mut languages: Vec<(String, PathBuf)> = corpora
        .into_iter()
        .map(|(language, path)| (language, PathBuf::from(path)))
        .collect();
    languages.sort();

    let (records, skipped) = profile_corpora(&languages, &config);
    if records.is_empty() {
        let reasons: Vec<String> = skipped.iter().map(ToString::to_string).collect();
        return Err(PyValueError::new_err(format!(
            "no usable corpus: {}",
            reasons.join("; ")
        )));
    }

    let matrix = vectorize(&normalize(&records)?)?;
    Ok(matrix.vectors.into_iter().collect())
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn treestats(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(corpus_profile, m)?)?;
    m.add_function(wrap_pyfunction!(fingerprints, m)?)?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;
    Ok(())
}
