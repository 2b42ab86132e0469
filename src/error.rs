use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SraSketchError {
    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid download method: {0}")]
    InvalidDownloadMethod(String),

    #[error("invalid parameter string '{params}': {reason}")]
    #[diagnostic(help("expected e.g. 'dna,k=31,scaled=1000' or 'protein,k=10,num=500,abund'"))]
    InvalidParameterConfiguration { params: String, reason: String },

    #[error("could not find downloaded file for {accession}")]
    #[diagnostic(help(
        "rerun with RUST_LOG=debug to see the kingfisher output, or try other --download-methods"
    ))]
    DownloadResultEmpty { accession: String },

    #[error("download of {accession} failed: {message}")]
    Downloader { accession: String, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("error when reading from '{path}': {message}")]
    SequenceRead { path: PathBuf, message: String },

    #[error("no sequences found in '{0}'")]
    EmptyInputFile(PathBuf),

    #[error("failed to write signature: {0}")]
    SignatureWrite(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl SraSketchError {
    /// Errors that only cost the current accession its sketch.
    pub fn is_sketch_skip(&self) -> bool {
        matches!(
            self,
            SraSketchError::SequenceRead { .. } | SraSketchError::EmptyInputFile(_)
        )
    }

    /// Errors raised by the download stage of a single accession.
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            SraSketchError::DownloadResultEmpty { .. } | SraSketchError::Downloader { .. }
        )
    }
}
