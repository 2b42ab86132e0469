use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DownloadMethod, default_download_methods};
use crate::error::SraSketchError;
use crate::params::{SketchFactory, build_factories};

pub const CONFIG_FILE_NAME: &str = "sra-sketch.json";
pub const DEFAULT_SIG_EXTENSION: &str = "zip";

/// Defaults read from a JSON file. Every field is optional; flags given on the
/// command line win.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub param_strings: Vec<String>,
    #[serde(default)]
    pub download_methods: Option<Vec<DownloadMethod>>,
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub sig_extension: Option<String>,
    #[serde(default)]
    pub check_sequence: Option<bool>,
}

/// Values taken from the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub param_strings: Vec<String>,
    pub download_methods: Option<Vec<DownloadMethod>>,
    pub threads: Option<u32>,
    pub sig_extension: Option<String>,
    pub check_sequence: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub factories: Vec<SketchFactory>,
    pub download_methods: Vec<DownloadMethod>,
    pub threads: u32,
    pub sig_extension: String,
    pub check_sequence: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; otherwise the user-level file is used
    /// when present.
    pub fn resolve(path: Option<&Path>) -> Result<Config, SraSketchError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::user_config_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Config::default()),
            },
        };
        debug!("loading config from {}", config_path.display());

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SraSketchError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| SraSketchError::ConfigParse(err.to_string()))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join("sra-sketch").join(CONFIG_FILE_NAME))
    }

    /// Merges command-line values over `config` and validates the result.
    /// Parameter strings are checked here, before any download starts.
    pub fn resolve_config(
        config: Config,
        overrides: Overrides,
    ) -> Result<ResolvedConfig, SraSketchError> {
        let param_strings = if overrides.param_strings.is_empty() {
            config.param_strings
        } else {
            overrides.param_strings
        };
        let factories = build_factories(param_strings.as_slice())?;

        let download_methods = overrides
            .download_methods
            .or(config.download_methods)
            .unwrap_or_else(default_download_methods);
        if download_methods.is_empty() {
            return Err(SraSketchError::ConfigParse(
                "download_methods must not be empty".to_string(),
            ));
        }

        let threads = overrides.threads.or(config.threads).unwrap_or(1);
        if threads == 0 {
            return Err(SraSketchError::ConfigParse(
                "threads must be a positive integer".to_string(),
            ));
        }

        let sig_extension = overrides
            .sig_extension
            .or(config.sig_extension)
            .unwrap_or_else(|| DEFAULT_SIG_EXTENSION.to_string());
        if sig_extension.trim_start_matches('.').is_empty() || sig_extension.contains('/') {
            return Err(SraSketchError::ConfigParse(format!(
                "invalid signature extension '{sig_extension}'"
            )));
        }

        Ok(ResolvedConfig {
            factories,
            download_methods,
            threads,
            sig_extension,
            check_sequence: overrides.check_sequence || config.check_sequence.unwrap_or(false),
        })
    }
}
