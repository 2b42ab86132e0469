use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Accession, DownloadFailurePolicy, DownloadMethod};
use crate::download::Downloader;
use crate::engine::{SketchOptions, sketch_files};
use crate::error::SraSketchError;
use crate::fs_util;
use crate::params::SketchFactory;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: Utf8PathBuf,
    pub download_only: bool,
    pub delete_fastq: bool,
    pub download_methods: Vec<DownloadMethod>,
    pub threads: u32,
    pub sig_extension: String,
    pub check_sequence: bool,
    pub on_download_failure: DownloadFailurePolicy,
}

impl RunOptions {
    pub fn signature_path(&self, accession: &Accession) -> Utf8PathBuf {
        let extension = self.sig_extension.trim_start_matches('.');
        self.output_dir.join(format!("{accession}.{extension}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccessionOutcome {
    Downloaded,
    Sketched { count: usize },
    SketchFailed,
    DownloadFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessionReport {
    pub accession: String,
    pub files: Vec<String>,
    pub outcome: AccessionOutcome,
    pub signature_path: Option<String>,
    pub cleaned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total_sketches: usize,
    pub skipped: usize,
    pub download_failed: usize,
    pub accessions: usize,
    pub started_at: String,
    pub finished_at: String,
    pub items: Vec<AccessionReport>,
}

impl RunReport {
    fn new(accessions: usize) -> Self {
        Self {
            total_sketches: 0,
            skipped: 0,
            download_failed: 0,
            accessions,
            started_at: iso_timestamp(),
            finished_at: String::new(),
            items: Vec::with_capacity(accessions),
        }
    }

    fn record(&mut self, item: AccessionReport) {
        match &item.outcome {
            AccessionOutcome::Sketched { count } => {
                assert!(*count > 0, "sketched accession without sketches");
                self.total_sketches += count;
            }
            AccessionOutcome::SketchFailed => self.skipped += 1,
            AccessionOutcome::DownloadFailed { .. } => self.download_failed += 1,
            AccessionOutcome::Downloaded => {}
        }
        self.items.push(item);
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Produced {} sketches total for {} input files.",
            self.total_sketches, self.accessions
        )];
        if self.skipped > 0 {
            lines.push(format!(
                "Skipped {} input files for various reasons.",
                self.skipped
            ));
        }
        if self.download_failed > 0 {
            lines.push(format!(
                "Failed to download {} accession(s).",
                self.download_failed
            ));
        }
        lines
    }
}

/// Drives download, sketch and cleanup for each accession in turn.
pub struct App<D: Downloader> {
    downloader: D,
    factories: Vec<SketchFactory>,
    options: RunOptions,
}

impl<D: Downloader> App<D> {
    pub fn new(downloader: D, factories: Vec<SketchFactory>, options: RunOptions) -> Self {
        Self {
            downloader,
            factories,
            options,
        }
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    /// Processes `accessions` in order. Returns `None` for download-only runs,
    /// which produce no report.
    pub fn run(
        &self,
        accessions: &[Accession],
        sink: &dyn ProgressSink,
    ) -> Result<Option<RunReport>, SraSketchError> {
        let mut report = RunReport::new(accessions.len());
        for accession in accessions {
            let item = self.process(accession, sink)?;
            report.record(item);
        }
        report.finished_at = iso_timestamp();

        if self.options.download_only {
            return Ok(None);
        }
        Ok(Some(report))
    }

    pub fn process(
        &self,
        accession: &Accession,
        sink: &dyn ProgressSink,
    ) -> Result<AccessionReport, SraSketchError> {
        if !accession.is_run_accession() {
            warn!("{accession} does not look like an SRA/ENA/DDBJ run accession");
        }
        let output_dir = self.options.output_dir.as_std_path();
        let methods = self
            .options
            .download_methods
            .iter()
            .map(DownloadMethod::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        sink.event(ProgressEvent::new(format!(
            "Downloading {accession} to {}",
            self.options.output_dir
        )));
        sink.event(ProgressEvent::new(format!(
            "kingfisher get -t {} -r {accession} -m {methods}",
            self.options.threads
        )));

        let start = Instant::now();
        let download = match self.downloader.download(
            accession,
            output_dir,
            self.options.threads,
            &self.options.download_methods,
        ) {
            Ok(download) => download,
            Err(err)
                if err.is_download_failure()
                    && self.options.on_download_failure == DownloadFailurePolicy::Skip =>
            {
                warn!("{err}; continuing with the next accession");
                sink.event(ProgressEvent::new(format!("{err}; skipping")));
                return Ok(AccessionReport {
                    accession: accession.to_string(),
                    files: Vec::new(),
                    outcome: AccessionOutcome::DownloadFailed {
                        reason: err.to_string(),
                    },
                    signature_path: None,
                    cleaned: false,
                });
            }
            Err(err) => return Err(err),
        };
        sink.event(ProgressEvent::timed(
            format!(
                "Found downloaded files for {accession}: {:?}",
                download.files
            ),
            start.elapsed(),
        ));

        let mut item = AccessionReport {
            accession: accession.to_string(),
            files: download
                .files
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            outcome: AccessionOutcome::Downloaded,
            signature_path: None,
            cleaned: false,
        };

        if !self.options.download_only {
            let destination = self.options.signature_path(accession);
            let result = sketch_files(
                &self.factories,
                &download.files,
                accession.as_str(),
                destination.as_std_path(),
                SketchOptions {
                    check_sequence: self.options.check_sequence,
                },
                sink,
            );
            // Sketch errors still clean up before they propagate.
            let result = match result {
                Ok(result) => result,
                Err(err) => {
                    self.cleanup(&download.files, sink)?;
                    return Err(err);
                }
            };
            item.outcome = match result {
                Some(count) => {
                    info!("{accession}: {count} sketch(es) saved to {destination}");
                    item.signature_path = Some(destination.to_string());
                    AccessionOutcome::Sketched { count }
                }
                None => AccessionOutcome::SketchFailed,
            };
        }

        item.cleaned = self.cleanup(&download.files, sink)?;
        Ok(item)
    }

    fn cleanup(
        &self,
        files: &[std::path::PathBuf],
        sink: &dyn ProgressSink,
    ) -> Result<bool, SraSketchError> {
        if !self.options.delete_fastq {
            return Ok(false);
        }
        for file in files {
            sink.event(ProgressEvent::new(format!("Removing {}", file.display())));
        }
        fs_util::remove_files(files)?;
        Ok(true)
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
