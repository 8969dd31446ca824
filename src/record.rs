//! Core data types shared by the pipeline stages.
//!
//! A [`CitationKey`] is an ADS bibcode as written in the LaTeX source, a
//! [`BibliographicRecord`] is the metadata the service returned for one key,
//! and [`FetchOutcome`] pairs every requested key with its [`QueryResult`].

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Year plus 15 characters; 14 when an ampersand has been dropped
/// (`2016AA...590A..10K` for `2016A&A...590A..10K`).
static BIBCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}[A-Za-z0-9.&:+'\-]{14,15}$").expect("invalid bibcode pattern")
});

/// An opaque citation key (ADS bibcode).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationKey(String);

impl CitationKey {
    /// Parses a raw citation entry, returning `None` unless it is a bibcode.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// ```
    /// use tex2bib::CitationKey;
    ///
    /// assert!(CitationKey::parse("2016A&A...590A..10K").is_some());
    /// assert!(CitationKey::parse("smith2020").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if BIBCODE_RE.is_match(raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Returns true if `raw` has the shape of a bibcode.
    pub fn is_valid(raw: &str) -> bool {
        BIBCODE_RE.is_match(raw)
    }

    /// Wraps a string that is already known to be a bibcode.
    pub(crate) fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CitationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CitationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single field value as returned by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Number(i64),
}

impl FieldValue {
    /// The first textual value, if any.
    pub fn first(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::List(items) => items.first().cloned(),
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }

    /// All values as a list; scalars become a one-element list.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FieldValue::Text(s) => vec![s.clone()],
            FieldValue::List(items) => items.clone(),
            FieldValue::Number(n) => vec![n.to_string()],
        }
    }
}

/// Metadata for one publication, keyed by field name.
#[derive(Debug, Clone, PartialEq)]
pub struct BibliographicRecord {
    pub key: CitationKey,
    pub fields: BTreeMap<String, FieldValue>,
}

impl BibliographicRecord {
    pub fn new(key: CitationKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style helper used when assembling records by hand.
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// First non-empty textual value of a field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(FieldValue::first)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Result of looking up one key.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Found(BibliographicRecord),
    NotFound(CitationKey),
}

impl QueryResult {
    pub fn key(&self) -> &CitationKey {
        match self {
            QueryResult::Found(record) => &record.key,
            QueryResult::NotFound(key) => key,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QueryResult::Found(_))
    }
}

/// One [`QueryResult`] per requested key, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub results: Vec<QueryResult>,
}

impl FetchOutcome {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Records that were found, in request order.
    pub fn records(&self) -> Vec<&BibliographicRecord> {
        self.results
            .iter()
            .filter_map(|r| match r {
                QueryResult::Found(record) => Some(record),
                QueryResult::NotFound(_) => None,
            })
            .collect()
    }

    /// Keys the service had no record for, in request order.
    pub fn missing(&self) -> Vec<CitationKey> {
        self.results
            .iter()
            .filter_map(|r| match r {
                QueryResult::NotFound(key) => Some(key.clone()),
                QueryResult::Found(_) => None,
            })
            .collect()
    }
}
