//! Batched metadata lookup.
//!
//! [`fetch`] splits the key list into batches, asks a [`MetadataSource`] for
//! each batch and pairs every requested key with a [`QueryResult`]. A key the
//! source has no record for becomes [`QueryResult::NotFound`]; any
//! [`FetchError`] aborts the whole lookup, since a bad token or an unreachable
//! host would fail every remaining batch the same way.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{info, warn};

use crate::record::{BibliographicRecord, CitationKey, FetchOutcome, QueryResult};

/// Maximum number of keys sent in one request.
pub const DEFAULT_BATCH_SIZE: usize = 90;

/// Fatal lookup errors.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request rejected with HTTP {0}")]
    Unauthorized(u16),

    #[error("service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    #[error("invalid response: {0}")]
    Parse(String),
}

/// A bibliographic service that can resolve a batch of keys.
pub trait MetadataSource {
    /// Human-readable service name for diagnostics.
    fn name(&self) -> &str;

    /// Returns the records the service knows about among `batch`.
    ///
    /// Keys without a record are simply absent from the result.
    fn lookup(&self, batch: &[CitationKey]) -> Result<Vec<BibliographicRecord>, FetchError>;
}

/// Looks up every key, `batch_size` keys per request.
///
/// The outcome holds exactly one result per input key, in input order.
/// A `batch_size` of zero is treated as one.
pub fn fetch<S: MetadataSource + ?Sized>(
    source: &S,
    keys: &[CitationKey],
    batch_size: usize,
) -> Result<FetchOutcome, FetchError> {
    let batch_size = batch_size.max(1);
    let total = keys.len();
    let mut found: HashMap<CitationKey, BibliographicRecord> = HashMap::new();

    for (index, batch) in keys.chunks(batch_size).enumerate() {
        let start = index * batch_size;
        let requested: HashSet<&CitationKey> = batch.iter().collect();

        let records = source.lookup(batch)?;

        let mut retrieved = 0;
        for record in records {
            if !requested.contains(&record.key) {
                warn!(
                    key = %record.key,
                    service = source.name(),
                    "retrieved bibcode that is not in the input, ignoring"
                );
                continue;
            }
            if found.insert(record.key.clone(), record).is_none() {
                retrieved += 1;
            }
        }

        info!(
            "query {}-{} of {} on {}: {} retrieved",
            start + 1,
            start + batch.len(),
            total,
            source.name(),
            retrieved
        );
    }

    let results = keys
        .iter()
        .map(|key| match found.get(key) {
            Some(record) => QueryResult::Found(record.clone()),
            None => QueryResult::NotFound(key.clone()),
        })
        .collect();

    Ok(FetchOutcome { results })
}
