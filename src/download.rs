use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Accession, DownloadMethod};
use crate::error::SraSketchError;
use crate::fs_util;

/// Files fetched for one accession, in probe order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub accession: Accession,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum ToolStatus {
    Ready,
    Missing { message: String },
}

pub trait Downloader {
    fn download(
        &self,
        accession: &Accession,
        destination_dir: &Path,
        threads: u32,
        methods: &[DownloadMethod],
    ) -> Result<DownloadResult, SraSketchError>;

    fn tool_status(&self) -> ToolStatus {
        ToolStatus::Ready
    }
}

/// Runs `kingfisher get` and then looks for the FASTQ files it leaves behind.
#[derive(Debug, Clone)]
pub struct KingfisherDownloader {
    kingfisher: Option<PathBuf>,
}

impl KingfisherDownloader {
    pub fn new() -> Self {
        Self {
            kingfisher: fs_util::find_in_path("kingfisher"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            kingfisher: Some(program),
        }
    }
}

impl Default for KingfisherDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Downloader for KingfisherDownloader {
    fn download(
        &self,
        accession: &Accession,
        destination_dir: &Path,
        threads: u32,
        methods: &[DownloadMethod],
    ) -> Result<DownloadResult, SraSketchError> {
        let program = self
            .kingfisher
            .as_ref()
            .ok_or_else(|| SraSketchError::MissingTool("kingfisher".to_string()))?;
        fs::create_dir_all(destination_dir)
            .map_err(|err| SraSketchError::Filesystem(err.to_string()))?;

        let args = kingfisher_args(accession, threads, methods);
        debug!("kingfisher {}", args.join(" "));
        let output = Command::new(program)
            .args(&args)
            .current_dir(destination_dir)
            .output()
            .map_err(|err| SraSketchError::Downloader {
                accession: accession.to_string(),
                message: err.to_string(),
            })?;
        log_captured(accession, "stdout", &output.stdout);
        log_captured(accession, "stderr", &output.stderr);
        // Success is judged by the files on disk, not the exit status.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "kingfisher exited with {} for {accession}: {}",
                output.status,
                stderr.trim()
            );
        }

        probe_downloads(accession, destination_dir)
    }

    fn tool_status(&self) -> ToolStatus {
        match self.kingfisher {
            Some(_) => ToolStatus::Ready,
            None => ToolStatus::Missing {
                message: "kingfisher (https://github.com/wwood/kingfisher-download)".to_string(),
            },
        }
    }
}

fn log_captured(accession: &Accession, stream: &str, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if !text.is_empty() {
        debug!("kingfisher {stream} for {accession}:\n{text}");
    }
}

pub fn kingfisher_args(
    accession: &Accession,
    threads: u32,
    methods: &[DownloadMethod],
) -> Vec<String> {
    let mut args = vec![
        "get".to_string(),
        "-t".to_string(),
        threads.to_string(),
        "-r".to_string(),
        accession.as_str().to_string(),
        "-m".to_string(),
    ];
    args.extend(methods.iter().map(|method| method.as_str().to_string()));
    args
}

/// Single-end first, then the paired mates.
pub fn expected_file_names(accession: &Accession) -> [String; 3] {
    [
        format!("{accession}.fastq.gz"),
        format!("{accession}_1.fastq.gz"),
        format!("{accession}_2.fastq.gz"),
    ]
}

pub fn probe_downloads(
    accession: &Accession,
    destination_dir: &Path,
) -> Result<DownloadResult, SraSketchError> {
    let files = expected_file_names(accession)
        .into_iter()
        .map(|name| destination_dir.join(name))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    if files.is_empty() {
        return Err(SraSketchError::DownloadResultEmpty {
            accession: accession.to_string(),
        });
    }
    debug!("found downloaded files for {accession}: {files:?}");
    Ok(DownloadResult {
        accession: accession.clone(),
        files,
    })
}
