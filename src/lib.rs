//! tex2bib: build a BibTeX file from the ADS bibcodes cited in LaTeX documents.
//!
//! This library provides functionality to:
//! - Extract bibcodes from `\cite`-style commands
//! - Optionally strip ampersands from the extracted keys
//! - Look the keys up on the ADS API in batches
//! - Write the results as a BibTeX file and report unresolved keys

pub mod ads;
pub mod bibtex;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod record;

pub use ads::AdsClient;
pub use bibtex::{escape_bibtex, render_bibliography, render_entry, write_bibliography, EntryType};
pub use config::{ConfigFile, Settings};
pub use extract::{extract_from_document, extract_keys, read_documents};
pub use fetch::{fetch, FetchError, MetadataSource};
pub use normalize::strip_ampersands;
pub use pipeline::{Pipeline, PipelineError, RunReport, Stage};
pub use record::{BibliographicRecord, CitationKey, FetchOutcome, FieldValue, QueryResult};
