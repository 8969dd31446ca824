//! The extract → normalize → fetch → write pipeline.
//!
//! Each stage consumes the previous stage's output. Input and fetch errors
//! abort before anything is written; write errors leave no partial file.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::bibtex::{write_bibliography, WriteError};
use crate::config::Settings;
use crate::extract::{extract_keys, read_documents, ExtractError};
use crate::fetch::{fetch, FetchError, MetadataSource};
use crate::normalize::strip_ampersands;
use crate::record::CitationKey;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Normalize,
    Fetch,
    Write,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Fetch => "fetch",
            Stage::Write => "write",
            Stage::Report => "report",
        };
        f.write_str(name)
    }
}

/// Fatal pipeline errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] ExtractError),

    #[error("{service} query failed: {source}")]
    Fetch {
        service: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl PipelineError {
    /// The stage the run was aborted in.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Input(_) => Stage::Extract,
            PipelineError::Fetch { .. } => Stage::Fetch,
            PipelineError::Write(_) => Stage::Write,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Keys sent to the service, in first-seen order.
    pub requested: Vec<CitationKey>,
    /// Number of entries written.
    pub written: usize,
    /// Keys the service had no record for, in first-seen order.
    pub missing: Vec<CitationKey>,
    /// Destination file.
    pub output: PathBuf,
}

impl RunReport {
    pub fn all_resolved(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Runs the pipeline against a metadata source.
pub struct Pipeline<'a, S: MetadataSource + ?Sized> {
    settings: &'a Settings,
    source: &'a S,
}

impl<'a, S: MetadataSource + ?Sized> Pipeline<'a, S> {
    pub fn new(settings: &'a Settings, source: &'a S) -> Self {
        Self { settings, source }
    }

    /// Reads the input files, then processes their contents.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<RunReport, PipelineError> {
        let documents = read_documents(inputs)?;
        for (path, _) in &documents {
            info!("reading {}", path.display());
        }
        let texts: Vec<&str> = documents.iter().map(|(_, text)| text.as_str()).collect();
        self.process(&texts)
    }

    /// Processes already loaded document contents.
    pub fn process(&self, documents: &[&str]) -> Result<RunReport, PipelineError> {
        enter(Stage::Extract);
        let mut keys = extract_keys(documents);
        info!("{} references extracted", keys.len());

        if self.settings.strip_ampersands {
            enter(Stage::Normalize);
            keys = strip_ampersands(keys);
        }

        enter(Stage::Fetch);
        let outcome =
            fetch(self.source, &keys, self.settings.batch_size).map_err(|source| {
                PipelineError::Fetch {
                    service: self.source.name().to_string(),
                    source,
                }
            })?;

        enter(Stage::Write);
        let output: &Path = &self.settings.bibfile;
        let written = write_bibliography(output, &outcome.records())?;

        enter(Stage::Report);
        Ok(RunReport {
            requested: keys,
            written,
            missing: outcome.missing(),
            output: output.to_path_buf(),
        })
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "entering stage");
}
