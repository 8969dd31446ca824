//! Run configuration.
//!
//! Settings come from, in increasing precedence: built-in defaults, the
//! platform config file (`<config_dir>/tex2bib/config.toml`), a
//! `.tex2bib.toml` in the working directory, and command-line flags. The ADS
//! token may also come from the `ADS_API_TOKEN` environment variable.
//!
//! ```toml
//! token = "your-ads-token"
//! bibfile = "references.bib"
//! endpoint = "https://api.adsabs.harvard.edu/v1"
//! batch_size = 90
//! timeout_secs = 30
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::ads::DEFAULT_ENDPOINT;
use crate::fetch::DEFAULT_BATCH_SIZE;

/// Output file used when neither the flag nor a config file names one.
pub const DEFAULT_BIBFILE: &str = "references.bib";

/// Environment variable holding the ADS token.
pub const TOKEN_ENV: &str = "ADS_API_TOKEN";

/// Per-directory config file name.
pub const LOCAL_CONFIG: &str = ".tex2bib.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no ADS token given")]
    MissingToken,
}

/// On-disk TOML configuration. All fields are optional so partial files work.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub token: Option<String>,
    pub bibfile: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub batch_size: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Merges two configs: values in `overlay` take precedence.
    pub fn merge(self, overlay: ConfigFile) -> ConfigFile {
        ConfigFile {
            token: overlay.token.or(self.token),
            bibfile: overlay.bibfile.or(self.bibfile),
            endpoint: overlay.endpoint.or(self.endpoint),
            batch_size: overlay.batch_size.or(self.batch_size),
            timeout_secs: overlay.timeout_secs.or(self.timeout_secs),
        }
    }
}

/// Platform config file path: `<config_dir>/tex2bib/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tex2bib").join("config.toml"))
}

/// Loads a config file, returning `Ok(None)` if it does not exist.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Loads a config file named on the command line; it must exist.
pub fn load_explicit(path: &Path) -> Result<ConfigFile, ConfigError> {
    load_from_path(path)?.ok_or_else(|| ConfigError::Read {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
    })
}

/// Loads the platform config overlaid with the working-directory config.
pub fn load_default() -> Result<ConfigFile, ConfigError> {
    let platform = match config_path() {
        Some(path) => load_from_path(&path)?,
        None => None,
    };
    let local = load_from_path(Path::new(LOCAL_CONFIG))?;

    Ok(platform.unwrap_or_default().merge(local.unwrap_or_default()))
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub token: Option<String>,
    pub bibfile: PathBuf,
    pub endpoint: String,
    pub batch_size: usize,
    pub timeout: Duration,
    pub strip_ampersands: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: None,
            bibfile: PathBuf::from(DEFAULT_BIBFILE),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            strip_ampersands: false,
        }
    }
}

impl Settings {
    /// Builds settings from a config file, filling gaps with defaults.
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = Settings::default();
        Self {
            token: non_empty(file.token),
            bibfile: file.bibfile.unwrap_or(defaults.bibfile),
            endpoint: file.endpoint.unwrap_or(defaults.endpoint),
            batch_size: file.batch_size.unwrap_or(defaults.batch_size),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            strip_ampersands: defaults.strip_ampersands,
        }
    }

    /// Picks the token: flag first, then environment, then config file.
    pub fn with_token(mut self, flag: Option<String>, env: Option<String>) -> Self {
        self.token = non_empty(flag)
            .or_else(|| non_empty(env))
            .or(self.token);
        self
    }

    /// Returns the token or [`ConfigError::MissingToken`].
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::MissingToken)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
