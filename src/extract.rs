//! LaTeX citation key extraction.
//!
//! Finds bibcodes inside citation commands such as `\cite{...}`, `\citet{...}`,
//! `\citep[see][p. 4]{...}` and `\nocite{...}`. Only literal pattern matching
//! is performed: macros are not expanded and comments are not stripped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::CitationKey;

/// `\cite...` or `\nocite`, optional star, up to two optional arguments,
/// then the key list. Group 1 is the raw key list.
static CITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:no)?cite[a-zA-Z]*\*?\s*(?:\[[^\]]*\]\s*){0,2}\{([^{}]*)\}")
        .expect("invalid citation pattern")
});

/// Errors that can occur while reading input documents.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads every input document up front.
///
/// # Errors
///
/// Returns the first file that cannot be read.
pub fn read_documents(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>, ExtractError> {
    paths
        .iter()
        .map(|path| read_document(path).map(|text| (path.clone(), text)))
        .collect()
}

/// Reads a document as text. Bytes that are not UTF-8 (e.g. a Latin-1
/// source) are replaced; bibcodes are ASCII and survive the decoding.
fn read_document(path: &Path) -> Result<String, ExtractError> {
    debug!(path = %path.display(), "reading document");
    let bytes = fs::read(path).map_err(|source| ExtractError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(path = %path.display(), "document is not valid UTF-8, decoding lossily");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Extracts the bibcodes cited in a single document, in order of appearance,
/// without deduplication.
///
/// Entries that are not bibcodes are skipped with a warning.
///
/// # Examples
///
/// ```
/// use tex2bib::extract_from_document;
///
/// let keys = extract_from_document(r"As shown by \citet{1998ApJ...500..525S}.");
/// assert_eq!(keys.len(), 1);
/// assert_eq!(keys[0].as_str(), "1998ApJ...500..525S");
/// ```
pub fn extract_from_document(text: &str) -> Vec<CitationKey> {
    let mut keys = Vec::new();

    for cap in CITE_RE.captures_iter(text) {
        let Some(list) = cap.get(1) else {
            continue;
        };

        for entry in list.as_str().split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match CitationKey::parse(entry) {
                Some(key) => keys.push(key),
                None => warn!(entry, "skipping citation that is not a bibcode"),
            }
        }
    }

    keys
}

/// Extracts the unique bibcodes cited across all documents.
///
/// Keys are returned in first-seen order: documents are scanned in the order
/// given and each document from start to end.
pub fn extract_keys<S: AsRef<str>>(documents: &[S]) -> Vec<CitationKey> {
    let mut seen: HashSet<CitationKey> = HashSet::new();
    let mut keys = Vec::new();

    for doc in documents {
        for key in extract_from_document(doc.as_ref()) {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }

    keys
}
