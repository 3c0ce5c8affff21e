//! CoNLL-U file parsing
//!
//! Parses CoNLL-U files (plain or gzip-compressed) into [`Tree`]s.
//! Only the columns the statistics need are kept: ID, UPOS, HEAD and DEPREL.
//! Multiword token lines (`3-4`) and empty nodes (`5.1`) are dropped before
//! the tree is built.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use crate::tree::{LabelPool, Node, Tree, TokenId, TreeError};
use atoi::FromRadix10Checked;
use bstr::ByteSlice;
use bstr::io::{BufReadExt, ByteLines};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use thiserror::Error;

const ID: usize = 0;
const UPOS: usize = 3;
const HEAD: usize = 6;
const DEPREL: usize = 7;
const FIELD_COUNT: usize = 10;

/// What went wrong while reading a sentence
#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected {FIELD_COUNT} fields, found {0}")]
    FieldCount(usize),
    #[error("invalid ID: {0}")]
    InvalidId(String),
    #[error("invalid HEAD: {0}")]
    InvalidHead(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Error during CoNLL-U parsing
#[derive(Debug, Error)]
#[error("Parse error at line {line_num}: {kind}")]
pub struct ParseError {
    pub line_num: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    fn new(line_num: usize, kind: impl Into<ParseErrorKind>) -> Self {
        Self {
            line_num,
            kind: kind.into(),
        }
    }
}

/// CoNLL-U reader that iterates over sentences
pub struct CoNLLUReader<R: BufRead> {
    lines: ByteLines<R>,
    line_num: usize,
    pool: LabelPool,
}

impl CoNLLUReader<Box<dyn BufRead>> {
    /// Create a reader from a file path; `.gz` files are decompressed on the fly
    pub fn from_file(path: &Path, pool: LabelPool) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader, pool))
    }
}

impl CoNLLUReader<Cursor<Vec<u8>>> {
    /// Create a reader from a string
    pub fn from_string(text: &str, pool: LabelPool) -> Self {
        Self::new(Cursor::new(text.as_bytes().to_vec()), pool)
    }
}

impl<R: BufRead> CoNLLUReader<R> {
    pub fn new(reader: R, pool: LabelPool) -> Self {
        Self {
            lines: reader.byte_lines(),
            line_num: 0,
            pool,
        }
    }
}

impl<R: BufRead> Iterator for CoNLLUReader<R> {
    type Item = Result<Tree, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut nodes = Vec::new();
        let mut seen_tokens = false;

        // Read lines until we hit a blank line (sentence boundary) or EOF
        loop {
            self.line_num += 1;
            match self.lines.next() {
                None => {
                    if !seen_tokens {
                        return None;
                    }
                    // Last sentence without trailing blank line
                    break;
                }
                Some(Err(e)) => return Some(Err(ParseError::new(self.line_num, e))),
                Some(Ok(line)) => {
                    let line = line.trim();

                    if line.is_empty() {
                        if seen_tokens {
                            break;
                        }
                        continue;
                    }

                    if line.starts_with(b"#") {
                        continue;
                    }

                    seen_tokens = true;
                    match parse_line(line, &self.pool) {
                        Ok(Some(node)) => nodes.push(node),
                        Ok(None) => {}
                        Err(kind) => {
                            let line_num = self.line_num;
                            self.skip_sentence();
                            return Some(Err(ParseError::new(line_num, kind)));
                        }
                    }
                }
            }
        }

        Some(Tree::from_nodes(nodes).map_err(|e| ParseError::new(self.line_num, e)))
    }
}

impl<R: BufRead> CoNLLUReader<R> {
    // Discard the rest of a broken sentence so the next call starts clean
    fn skip_sentence(&mut self) {
        for line in self.lines.by_ref() {
            self.line_num += 1;
            match line {
                Ok(line) if line.trim().is_empty() => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}

/// Read every sentence of a corpus file, failing on the first bad one
pub fn read_treebank(path: &Path, pool: &LabelPool) -> Result<Vec<Tree>, ParseError> {
    let reader =
        CoNLLUReader::from_file(path, pool.clone()).map_err(|e| ParseError::new(0, e))?;
    reader.collect()
}

/// Parse a single token line. Returns `None` for multiword tokens and empty
/// nodes.
fn parse_line(line: &[u8], pool: &LabelPool) -> Result<Option<Node>, ParseErrorKind> {
    let fields: Vec<&[u8]> = line.split_str("\t").collect();
    if fields.len() != FIELD_COUNT {
        return Err(ParseErrorKind::FieldCount(fields.len()));
    }

    let id_field = fields[ID];
    if memchr::memchr2(b'-', b'.', id_field).is_some() {
        return Ok(None);
    }
    let id = parse_index(id_field)
        .filter(|&id| id > 0)
        .ok_or_else(|| ParseErrorKind::InvalidId(id_field.to_str_lossy().into_owned()))?;
    let head = parse_index(fields[HEAD])
        .ok_or_else(|| ParseErrorKind::InvalidHead(fields[HEAD].to_str_lossy().into_owned()))?;

    let upos = pool.intern(&fields[UPOS].to_str_lossy());
    let deprel = pool.intern(&fields[DEPREL].to_str_lossy());

    Ok(Some(Node::new(id, head, deprel, upos)))
}

/// Parse an unsigned decimal, rejecting trailing garbage and overflow
fn parse_index(field: &[u8]) -> Option<TokenId> {
    let (value, used) = TokenId::from_radix_10_checked(field);
    if used == field.len() && used > 0 {
        value
    } else {
        None
    }
}
