//! Run configuration
//!
//! Defaults cover the usual layout: one `<language>.conllu` (or
//! `.conllu.gz`) file per language in, one `<language>.json` record per
//! language out. A JSON file can override any field; command-line flags
//! override the file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Optional rescaling of the feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scaling {
    #[default]
    None,
    /// Every feature rescaled to [0, 1] across languages
    MinMax,
}

impl FromStr for Scaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Scaling::None),
            "min-max" | "minmax" => Ok(Scaling::MinMax),
            _ => Err(format!("Unknown scaling: {s}. Valid values: none, min-max")),
        }
    }
}

impl fmt::Display for Scaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scaling::None => write!(f, "none"),
            Scaling::MinMax => write!(f, "min-max"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Governor tag recorded for the root token's tag pair
    pub root_tag: String,
    /// File name suffixes of corpus files
    pub corpus_suffixes: Vec<String>,
    /// File name suffix of persisted records
    pub record_suffix: String,
    /// Rounding precision of the sanity checks
    pub decimals: i32,
    pub scaling: Scaling,
    /// Worker threads; rayon's default when unset
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_tag: "ROOT".to_string(),
            corpus_suffixes: vec![".conllu".to_string(), ".conllu.gz".to_string()],
            record_suffix: ".json".to_string(),
            decimals: crate::sanity::DEFAULT_DECIMALS,
            scaling: Scaling::None,
            jobs: None,
        }
    }
}

impl Config {
    /// Read a JSON config. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_tag.is_empty() {
            return Err(ConfigError::Invalid("root_tag is empty".to_string()));
        }
        if self.corpus_suffixes.is_empty() || self.corpus_suffixes.iter().any(String::is_empty) {
            return Err(ConfigError::Invalid(
                "corpus_suffixes must be non-empty strings".to_string(),
            ));
        }
        if self.record_suffix.is_empty() {
            return Err(ConfigError::Invalid("record_suffix is empty".to_string()));
        }
        if !(0..=17).contains(&self.decimals) {
            return Err(ConfigError::Invalid(format!(
                "decimals must be between 0 and 17, got {}",
                self.decimals
            )));
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid("jobs must be positive".to_string()));
        }
        Ok(())
    }

    /// Language name of a corpus file, if it has a corpus suffix
    pub fn corpus_language(&self, path: &Path) -> Option<String> {
        strip_suffix(path, &self.corpus_suffixes)
    }

    /// Language name of a record file, if it has the record suffix
    pub fn record_language(&self, path: &Path) -> Option<String> {
        strip_suffix(path, std::slice::from_ref(&self.record_suffix))
    }
}

/// File name minus the longest matching suffix
fn strip_suffix(path: &Path, suffixes: &[String]) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    suffixes
        .iter()
        .filter_map(|suffix| name.strip_suffix(suffix.as_str()))
        .min_by_key(|stem| stem.len())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
