use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SraSketchError;

static RUN_ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[SED]RR\d+$").expect("static regex"));

/// Identifier of one archived sequencing run. Also used as the stem of every
/// file written for it, so it must be a plain file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SRA, ENA and DDBJ run accessions (`SRR…`, `ERR…`, `DRR…`).
    pub fn is_run_accession(&self) -> bool {
        RUN_ACCESSION.is_match(&self.0)
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = SraSketchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed.starts_with('.')
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'));
        if !is_valid {
            return Err(SraSketchError::InvalidAccession(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Retrieval strategies understood by `kingfisher get -m`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DownloadMethod {
    EnaAscp,
    EnaFtp,
    Prefetch,
    AwsHttp,
    AwsCp,
    GcpCp,
}

impl DownloadMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadMethod::EnaAscp => "ena-ascp",
            DownloadMethod::EnaFtp => "ena-ftp",
            DownloadMethod::Prefetch => "prefetch",
            DownloadMethod::AwsHttp => "aws-http",
            DownloadMethod::AwsCp => "aws-cp",
            DownloadMethod::GcpCp => "gcp-cp",
        }
    }
}

impl fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadMethod {
    type Err = SraSketchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "ena-ascp" => Ok(DownloadMethod::EnaAscp),
            "ena-ftp" => Ok(DownloadMethod::EnaFtp),
            "prefetch" => Ok(DownloadMethod::Prefetch),
            "aws-http" => Ok(DownloadMethod::AwsHttp),
            "aws-cp" => Ok(DownloadMethod::AwsCp),
            "gcp-cp" => Ok(DownloadMethod::GcpCp),
            _ => Err(SraSketchError::InvalidDownloadMethod(value.to_string())),
        }
    }
}

pub fn default_download_methods() -> Vec<DownloadMethod> {
    vec![
        DownloadMethod::EnaFtp,
        DownloadMethod::AwsHttp,
        DownloadMethod::Prefetch,
    ]
}

/// What happens to the rest of the run when one accession fails to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFailurePolicy {
    #[default]
    Skip,
    Abort,
}
