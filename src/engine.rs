use std::path::{Path, PathBuf};

use needletail::errors::{ParseError, ParseErrorKind};
use needletail::parse_fastx_file;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::SraSketchError;
use crate::params::SketchFactory;
use crate::signature::SignatureWriter;
use crate::sketch::SketchSet;

const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct SketchOptions {
    /// Reject reads with non-ACGT k-mers instead of skipping those k-mers.
    pub check_sequence: bool,
}

/// Streams every record of `files` through a fresh sketch set per factory and
/// saves the result to `destination`.
///
/// Returns `Ok(None)` when the accession has to be skipped: an empty input
/// file or malformed content in any file. Nothing is written in that case.
pub fn sketch_files(
    factories: &[SketchFactory],
    files: &[PathBuf],
    name: &str,
    destination: &Path,
    options: SketchOptions,
    sink: &dyn ProgressSink,
) -> Result<Option<usize>, SraSketchError> {
    sink.event(ProgressEvent::new(format!(
        "sketching {:?} => '{}'",
        files,
        destination.display()
    )));

    let mut sets = factories
        .iter()
        .map(SketchFactory::build)
        .collect::<Vec<_>>();

    for path in files {
        match feed_file(path, &mut sets, options, sink) {
            Ok(records) => {
                sink.event(ProgressEvent::new(format!(
                    "...{} {records} sequences",
                    path.display()
                )));
            }
            Err(err) if err.is_sketch_skip() => {
                warn!("{err}; skipping {name}");
                sink.event(ProgressEvent::new(format!("{err}; skipping {name}")));
                return Ok(None);
            }
            Err(err) => return Err(err),
        }
    }

    // Recorded the way sourmash sketch does it: the last file read.
    let filename = files
        .last()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    for set in &mut sets {
        set.set_name(name, &filename);
    }

    let mut writer = SignatureWriter::create(destination)?;
    for set in &sets {
        writer.add(set)?;
    }
    let count = writer.finish()?;
    debug!(
        "saved {count} sketch(es) for {name} to {}",
        destination.display()
    );
    Ok(Some(count))
}

fn feed_file(
    path: &Path,
    sets: &mut [SketchSet],
    options: SketchOptions,
    sink: &dyn ProgressSink,
) -> Result<usize, SraSketchError> {
    let mut reader = parse_fastx_file(path).map_err(|err| read_error(path, err))?;
    let force = !options.check_sequence;
    let mut records = 0usize;

    while let Some(record) = reader.next() {
        let record = record.map_err(|err| read_error(path, err))?;
        let seq = record.seq();
        for set in sets.iter_mut() {
            set.add_sequence(&seq, force)
                .map_err(|err| SraSketchError::SequenceRead {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })?;
        }
        records += 1;
        if records % PROGRESS_EVERY == 0 {
            sink.event(ProgressEvent::new(format!(
                "...{} {records}",
                path.display()
            )));
        }
    }

    if records == 0 {
        return Err(SraSketchError::EmptyInputFile(path.to_path_buf()));
    }
    Ok(records)
}

fn read_error(path: &Path, err: ParseError) -> SraSketchError {
    if matches!(err.kind, ParseErrorKind::EmptyFile) {
        SraSketchError::EmptyInputFile(path.to_path_buf())
    } else {
        SraSketchError::SequenceRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
