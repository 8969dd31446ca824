//! Shared test constants and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Bibcodes used across the integration tests.
pub const SCHLEGEL: &str = "1998ApJ...500..525S";
pub const KIEHLMANN: &str = "2016A&A...590A..10K";
pub const KIEHLMANN_NO_AMP: &str = "2016AA...590A..10K";
pub const BLINOV: &str = "2019MNRAS.482.5023B";

/// Fields requested from ADS, joined as sent in the `fl` parameter.
pub fn field_list() -> String {
    tex2bib::ads::FIELDS.join(",")
}

/// Build an ADS search response containing one article per bibcode.
///
/// Each document gets an author `Author{last char}` and a title `Title {bibcode}`.
pub fn ads_body(bibcodes: &[&str]) -> String {
    let docs: Vec<serde_json::Value> = bibcodes
        .iter()
        .map(|bibcode| {
            serde_json::json!({
                "bibcode": bibcode,
                "author": [format!("Author{}, A.", bibcode.chars().last().unwrap_or('X'))],
                "title": [format!("Title {}", bibcode)],
                "pub": "The Astrophysical Journal",
                "year": &bibcode[..4],
                "pubdate": format!("{}-03-00", &bibcode[..4]),
                "doctype": "article",
            })
        })
        .collect();

    serde_json::json!({
        "responseHeader": {"status": 0},
        "response": {"numFound": docs.len(), "start": 0, "docs": docs},
    })
    .to_string()
}

/// The `q` parameter ADS should receive for a batch.
pub fn bibcode_query(bibcodes: &[&str]) -> String {
    let terms: Vec<String> = bibcodes.iter().map(|b| format!("\"{}\"", b)).collect();
    format!("bibcode:({})", terms.join(" OR "))
}

/// Write a file under `dir` and return its path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
