//! CLI for tex2bib - build a BibTeX file from the ADS bibcodes cited in LaTeX documents.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tex2bib::config::{self, ConfigError, Settings, TOKEN_ENV};
use tex2bib::{AdsClient, FetchError, Pipeline, PipelineError, RunReport};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Extracts bibcodes from TEXFILE(s), queries them on ADS, and creates a bib file
#[derive(Parser)]
#[command(name = "tex2bib")]
#[command(version)]
#[command(after_help = "\
Examples:
  tex2bib paper.tex
  tex2bib intro.tex results.tex -b paper.bib
  tex2bib paper.tex --token $ADS_API_TOKEN --ampersand

The token defaults to $ADS_API_TOKEN, then to `token` in the config file.")]
struct Cli {
    /// LaTeX input file(s)
    #[arg(required = true, value_name = "TEXFILE")]
    inputs: Vec<PathBuf>,

    /// ADS API token
    #[arg(short, long)]
    token: Option<String>,

    /// Output bib file [default: references.bib]
    #[arg(short, long, value_name = "BIBFILE")]
    bibfile: Option<PathBuf>,

    /// Remove ampersands from bibcodes before querying
    #[arg(short, long, visible_alias = "no-amp")]
    ampersand: bool,

    /// Show the ADS queries
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: <config dir>/tex2bib/config.toml and ./.tex2bib.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — input file not found / unreadable
    InputFile(String),
    /// Exit 11 — no ADS token available
    Credential(String),
    /// Exit 12 — token rejected by the service
    Auth(String),
    /// Exit 12 — network failure or service error
    Service(String),
    /// Exit 13 — cannot write the bib file
    OutputFile(String),
    /// Exit 14 — config file unreadable / invalid
    Config(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::Credential(_) => 11,
            AppError::Auth(_) | AppError::Service(_) => 12,
            AppError::OutputFile(_) => 13,
            AppError::Config(_) => 14,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::Credential(msg) => {
                let location = config::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| config::LOCAL_CONFIG.to_string());
                write!(
                    f,
                    "{}\n  hint: pass --token, set {}, or add `token = \"...\"` to {}",
                    msg, TOKEN_ENV, location
                )
            }
            AppError::Auth(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the ADS token is valid; no bib file was written",
                    msg
                )
            }
            AppError::Service(msg) => {
                write!(
                    f,
                    "{}\n  hint: check your network connection and the configured endpoint; no bib file was written",
                    msg
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
            AppError::Config(msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::MissingToken => AppError::Credential(e.to_string()),
            _ => AppError::Config(e.to_string()),
        }
    }
}

/// Maps a PipelineError to an AppError using type-safe matching.
fn map_pipeline_error(e: PipelineError) -> AppError {
    match e {
        PipelineError::Input(_) => AppError::InputFile(e.to_string()),
        PipelineError::Fetch {
            source: FetchError::Unauthorized(_),
            ..
        } => AppError::Auth(e.to_string()),
        PipelineError::Fetch { .. } => AppError::Service(e.to_string()),
        PipelineError::Write(_) => AppError::OutputFile(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tex2bib=debug" } else { "tex2bib=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // 1. Load configuration (explicit file or platform + working directory)
    let file = match &cli.config {
        Some(path) => config::load_explicit(path)?,
        None => config::load_default()?,
    };

    // 2. Apply command-line overrides
    let mut settings = Settings::from_file(file).with_token(cli.token, env::var(TOKEN_ENV).ok());
    if let Some(bibfile) = cli.bibfile {
        settings.bibfile = bibfile;
    }
    settings.strip_ampersands = cli.ampersand;

    // 3. A token is required before anything touches the network
    let token = settings.require_token()?;
    let client = AdsClient::new(&settings.endpoint, token, settings.timeout)
        .map_err(|e| AppError::Service(e.to_string()))?;

    // 4. Extract, query, write
    let report = Pipeline::new(&settings, &client)
        .run(&cli.inputs)
        .map_err(map_pipeline_error)?;

    print_report(&report);
    Ok(())
}

/// Prints the final summary and any unresolved bibcodes.
fn print_report(report: &RunReport) {
    eprintln!(
        "{} reference(s) written to {}.",
        report.written,
        report.output.display()
    );

    if !report.all_resolved() {
        eprintln!(
            "warning: {} reference(s) could not be found on ADS:",
            report.missing.len()
        );
        for key in &report.missing {
            eprintln!("  {}", key);
        }
    }
}
