//! NASA Astrophysics Data System (ADS) client.
//!
//! Uses the ADS search API to resolve bibcodes to metadata.
//! API documentation: https://github.com/adsabs/adsabs-dev-api

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::fetch::{FetchError, MetadataSource};
use crate::record::{BibliographicRecord, CitationKey, FieldValue};

/// Public ADS API root.
pub const DEFAULT_ENDPOINT: &str = "https://api.adsabs.harvard.edu/v1";

/// Fields requested for every bibcode.
pub const FIELDS: &[&str] = &[
    "bibcode",
    "author",
    "title",
    "pub",
    "year",
    "pubdate",
    "volume",
    "issue",
    "page",
    "doi",
    "doctype",
    "identifier",
    "booktitle",
    "editor",
    "publisher",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    docs: Vec<BTreeMap<String, Option<FieldValue>>>,
}

/// Blocking ADS search client.
#[derive(Debug, Clone)]
pub struct AdsClient {
    http: Client,
    endpoint: String,
    token: String,
}

impl AdsClient {
    /// Creates a client for `endpoint` (e.g. [`DEFAULT_ENDPOINT`]).
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Builds the search query for a batch: `bibcode:("a" OR "b")`.
pub fn build_query(batch: &[CitationKey]) -> String {
    let terms: Vec<String> = batch.iter().map(|k| format!("\"{}\"", k)).collect();
    format!("bibcode:({})", terms.join(" OR "))
}

/// Extracts a readable message from an ADS error body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["error", "message"] {
            if let Some(msg) = value.get(field).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}

/// Converts a search response body into records.
fn parse_docs(body: &str) -> Result<Vec<BibliographicRecord>, FetchError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut records = Vec::with_capacity(parsed.response.docs.len());
    for doc in parsed.response.docs {
        let mut fields: BTreeMap<String, FieldValue> = doc
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        let Some(bibcode) = fields.remove("bibcode").and_then(|v| v.first()) else {
            warn!("skipping ADS record without a bibcode");
            continue;
        };

        records.push(BibliographicRecord {
            key: CitationKey::new_unchecked(bibcode),
            fields,
        });
    }

    Ok(records)
}

impl MetadataSource for AdsClient {
    fn name(&self) -> &str {
        "ADS"
    }

    fn lookup(&self, batch: &[CitationKey]) -> Result<Vec<BibliographicRecord>, FetchError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/search/query", self.endpoint);
        let query = build_query(batch);
        let fields = FIELDS.join(",");
        let rows = batch.len().to_string();
        debug!(%url, %query, "querying ADS");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("q", query.as_str()),
                ("fl", fields.as_str()),
                ("rows", rows.as_str()),
            ])
            .send()?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Service {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let body = response.text()?;
        parse_docs(&body)
    }
}
