//! Batch driver: corpora in, records and feature vectors out
//!
//! `run_stats` profiles every corpus of a directory in parallel, one task
//! per language, and persists the records that pass the sanity checks.
//! `run_vectorize` loads persisted records, normalizes them against each
//! other and writes the feature matrix. A language that fails to parse,
//! aggregate or check is logged and skipped; a normalization or vector
//! mismatch aborts the batch.

use crate::aggregate::{AggregateError, aggregate};
use crate::config::{Config, Scaling};
use crate::conllu::{ParseError, read_treebank};
use crate::nested::Nested;
use crate::sanity::{self, SanityError};
use crate::schema::{SchemaError, normalize};
use crate::tree::LabelPool;
use crate::vectorize::{FeatureMatrix, VectorError, vectorize};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the feature matrix
pub const VECTORS_FILE: &str = "vectors.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Why one language was left out of a batch
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("sanity check failed: {0}")]
    Sanity(#[from] SanityError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors that abort a whole batch
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("no usable records in {0}")]
    NoRecords(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub language: String,
    pub reason: String,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.language, self.reason)
    }
}

/// Outcome of `run_stats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Languages whose records were written
    pub written: Vec<String>,
    pub skipped: Vec<Skipped>,
}

/// Outcome of `run_vectorize`
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizeReport {
    pub matrix: FeatureMatrix,
    /// Record files left out of the matrix
    pub skipped: Vec<Skipped>,
}

impl BatchReport {
    fn skip(&mut self, language: &str, reason: impl fmt::Display) {
        log::warn!("skipping {language}: {reason}");
        self.skipped.push(Skipped {
            language: language.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Files directly inside `dir` ending in one of `suffixes`, sorted
pub fn discover(dir: &Path, suffixes: &[String]) -> Result<Vec<PathBuf>, BatchError> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut found = BTreeSet::new();
    for suffix in suffixes {
        let pattern = format!("{base}/*{}", glob::Pattern::escape(suffix));
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) if path.is_file() => {
                    found.insert(path);
                }
                Ok(_) => {}
                Err(e) => log::warn!("cannot read {}: {}", e.path().display(), e.error()),
            }
        }
    }
    Ok(found.into_iter().collect())
}

/// Corpus files of `dir` keyed by language. A language found twice (say
/// plain and gzipped) keeps its first file.
pub fn corpora(dir: &Path, config: &Config) -> Result<Vec<(String, PathBuf)>, BatchError> {
    let mut seen = BTreeSet::new();
    let mut corpora = Vec::new();
    for path in discover(dir, &config.corpus_suffixes)? {
        let Some(language) = config.corpus_language(&path) else {
            continue;
        };
        if seen.insert(language.clone()) {
            corpora.push((language, path));
        } else {
            log::warn!("ignoring {}: {language} already has a corpus", path.display());
        }
    }
    Ok(corpora)
}

/// Read, aggregate and record one corpus
pub fn profile_corpus(path: &Path, config: &Config) -> Result<Nested, CorpusError> {
    let pool = LabelPool::new();
    let trees = read_treebank(path, &pool)?;
    let root_tag = pool.intern(&config.root_tag);
    let profile = aggregate(&trees, &pool, root_tag)?;
    log::debug!(
        "{}: {} trees, {} relations, {} tags",
        path.display(),
        profile.trees,
        profile.rels.len(),
        profile.postags.len()
    );
    Ok(profile.to_record())
}

/// Profile one corpus and run the sanity checks on the result
pub fn checked_profile(path: &Path, config: &Config) -> Result<Nested, CorpusError> {
    let record = profile_corpus(path, config)?;
    sanity::check(&record, config.decimals)?;
    Ok(record)
}

/// Profile several corpora in parallel without persisting anything. Corpora
/// that fail are logged and returned separately; the others come back in
/// input order.
pub fn profile_corpora(
    corpora: &[(String, PathBuf)],
    config: &Config,
) -> (Vec<(String, Nested)>, Vec<Skipped>) {
    let results: Vec<_> = corpora
        .par_iter()
        .map(|(language, path)| (language, checked_profile(path, config)))
        .collect();

    let mut records = Vec::with_capacity(results.len());
    let mut report = BatchReport::default();
    for (language, result) in results {
        match result {
            Ok(record) => records.push((language.clone(), record)),
            Err(e) => report.skip(language, e),
        }
    }
    (records, report.skipped)
}

pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

pub fn read_record(path: &Path) -> Result<Nested, PersistError> {
    let file = File::open(path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Check and write a single record, returning where it went
pub fn persist_record(
    output_dir: &Path,
    language: &str,
    record: &Nested,
    config: &Config,
) -> Result<PathBuf, CorpusError> {
    sanity::check(record, config.decimals)?;
    let path = output_dir.join(format!("{language}{}", config.record_suffix));
    write_json(&path, record)?;
    Ok(path)
}

/// Persist every record that was produced and passes the sanity checks
pub fn persist_records<I>(output_dir: &Path, records: I, config: &Config) -> BatchReport
where
    I: IntoIterator<Item = (String, Result<Nested, CorpusError>)>,
{
    let mut report = BatchReport::default();
    for (language, record) in records {
        match record.and_then(|record| persist_record(output_dir, &language, &record, config)) {
            Ok(path) => {
                log::info!("{language}: wrote {}", path.display());
                report.written.push(language);
            }
            Err(e) => report.skip(&language, e),
        }
    }
    report
}

/// Profile every corpus in `corpora_dir` and write one record per language
/// to `output_dir`
pub fn run_stats(
    corpora_dir: &Path,
    output_dir: &Path,
    config: &Config,
) -> Result<BatchReport, BatchError> {
    std::fs::create_dir_all(output_dir).map_err(|source| BatchError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let corpora = corpora(corpora_dir, config)?;
    log::info!(
        "profiling {} corpora from {}",
        corpora.len(),
        corpora_dir.display()
    );

    let profile_all = || -> Vec<(String, Result<Nested, CorpusError>)> {
        corpora
            .par_iter()
            .map(|(language, path)| {
                log::debug!("{language}: reading {}", path.display());
                (language.clone(), profile_corpus(path, config))
            })
            .collect()
    };
    let records = match config.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()?
            .install(profile_all),
        None => profile_all(),
    };

    let report = persist_records(output_dir, records, config);
    log::info!(
        "{} records written, {} languages skipped",
        report.written.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Load every persisted record of `dir`. Unreadable or misshapen files are
/// skipped.
pub fn load_records(
    dir: &Path,
    config: &Config,
) -> Result<(Vec<(String, Nested)>, Vec<Skipped>), BatchError> {
    let mut records = Vec::new();
    let mut report = BatchReport::default();
    for path in discover(dir, std::slice::from_ref(&config.record_suffix))? {
        if path.file_name().is_some_and(|name| name == VECTORS_FILE) {
            continue;
        }
        let Some(language) = config.record_language(&path) else {
            continue;
        };
        let checked = read_record(&path)
            .map_err(CorpusError::from)
            .and_then(|record| {
                sanity::check_shape(&record)?;
                Ok(record)
            });
        match checked {
            Ok(record) => records.push((language, record)),
            Err(e) => report.skip(&language, e),
        }
    }
    Ok((records, report.skipped))
}

/// Normalize the records of `records_dir` against each other and write the
/// feature matrix to `output_dir`
pub fn run_vectorize(
    records_dir: &Path,
    output_dir: &Path,
    config: &Config,
) -> Result<VectorizeReport, BatchError> {
    let (records, skipped) = load_records(records_dir, config)?;
    if records.is_empty() {
        return Err(BatchError::NoRecords(records_dir.to_path_buf()));
    }

    let normalized = normalize(&records)?;
    let mut matrix = vectorize(&normalized)?;
    if config.scaling == Scaling::MinMax {
        matrix.min_max_scale();
    }

    std::fs::create_dir_all(output_dir).map_err(|source| BatchError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let path = output_dir.join(VECTORS_FILE);
    write_json(&path, &matrix)?;
    log::info!(
        "wrote {} vectors of {} features to {}",
        matrix.len(),
        matrix.features.len(),
        path.display()
    );
    Ok(VectorizeReport { matrix, skipped })
}
