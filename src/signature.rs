use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::Utf8Path;
use flate2::Compression;
use flate2::write::GzEncoder;
use sourmash::collection::Collection;
use sourmash::manifest::{Manifest, Record};
use sourmash::prelude::ToWriter;
use sourmash::signature::Signature;
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::SraSketchError;
use crate::fs_util;
use crate::sketch::SketchSet;

const MANIFEST_NAME: &str = "SOURMASH-MANIFEST.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    Zip,
    GzipJson,
    Json,
}

impl SignatureFormat {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".zip") {
            SignatureFormat::Zip
        } else if name.ends_with(".gz") {
            SignatureFormat::GzipJson
        } else {
            SignatureFormat::Json
        }
    }
}

enum Target {
    Zip {
        zip: ZipWriter<File>,
        records: Vec<Record>,
        locations: HashSet<String>,
    },
    Json {
        signatures: Vec<Signature>,
        gzip: bool,
    },
}

/// Scoped write target for one signature file.
///
/// Everything goes to a temporary file beside the destination, which only
/// replaces the destination in [`SignatureWriter::finish`]. Dropping the
/// writer early, or any failed step, leaves the destination untouched.
pub struct SignatureWriter {
    destination: PathBuf,
    target: Target,
    temp: NamedTempFile,
    count: usize,
}

impl SignatureWriter {
    pub fn create(destination: &Path) -> Result<Self, SraSketchError> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|err| SraSketchError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix(".sra-sketch")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|err| SraSketchError::Filesystem(err.to_string()))?;

        let target = match SignatureFormat::from_path(destination) {
            SignatureFormat::Zip => {
                let handle = temp
                    .reopen()
                    .map_err(|err| SraSketchError::Filesystem(err.to_string()))?;
                Target::Zip {
                    zip: ZipWriter::new(handle),
                    records: Vec::new(),
                    locations: HashSet::new(),
                }
            }
            SignatureFormat::GzipJson => Target::Json {
                signatures: Vec::new(),
                gzip: true,
            },
            SignatureFormat::Json => Target::Json {
                signatures: Vec::new(),
                gzip: false,
            },
        };

        Ok(Self {
            destination: destination.to_path_buf(),
            target,
            temp,
            count: 0,
        })
    }

    /// Adds every sketch of `set` as its own signature, in order. Returns how
    /// many were added.
    pub fn add(&mut self, set: &SketchSet) -> Result<usize, SraSketchError> {
        let signatures = set.split();
        let added = signatures.len();
        for signature in signatures {
            match &mut self.target {
                Target::Zip {
                    zip,
                    records,
                    locations,
                } => {
                    let location = unique_location(locations, &signature.md5sum());
                    let mut encoded = GzEncoder::new(Vec::new(), Compression::default());
                    signature
                        .to_writer(&mut encoded)
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                    let encoded = encoded
                        .finish()
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                    zip.start_file(location.as_str(), stored_options())
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                    zip.write_all(&encoded)
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                    records.extend(Record::from_sig(&signature, &location));
                }
                Target::Json { signatures, .. } => signatures.push(signature),
            }
        }
        self.count += added;
        Ok(added)
    }

    /// Flushes the target and moves it over the destination.
    pub fn finish(self) -> Result<usize, SraSketchError> {
        let Self {
            destination,
            target,
            mut temp,
            count,
        } = self;
        assert!(
            count > 0,
            "no sketches were written to {}",
            destination.display()
        );

        match target {
            Target::Zip {
                mut zip, records, ..
            } => {
                zip.start_file(MANIFEST_NAME, stored_options())
                    .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                Manifest::from(records)
                    .to_writer(&mut zip)
                    .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                let file = zip
                    .finish()
                    .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                file.sync_all()
                    .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                drop(file);
                fs_util::validate_zip(temp.path())?;
            }
            Target::Json { signatures, gzip } => {
                let all = signatures.iter().collect::<Vec<_>>();
                if gzip {
                    let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
                    all.to_writer(&mut encoder)
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                    encoder
                        .finish()
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                } else {
                    all.to_writer(temp.as_file_mut())
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
                }
                temp.as_file()
                    .sync_all()
                    .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
            }
        }

        // Replaces an existing destination in one rename.
        temp.persist(&destination)
            .map_err(|err| SraSketchError::SignatureWrite(err.error.to_string()))?;
        debug!("saved {count} sketch(es) to {}", destination.display());
        Ok(count)
    }
}

/// Loads every signature stored at `path`, whatever its format.
pub fn load_signatures(path: &Path) -> Result<Vec<Signature>, SraSketchError> {
    match SignatureFormat::from_path(path) {
        SignatureFormat::Zip => {
            let utf8 = Utf8Path::from_path(path).ok_or_else(|| {
                SraSketchError::Filesystem(format!("non UTF-8 path {}", path.display()))
            })?;
            let collection = Collection::from_zipfile(utf8)
                .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
            collection
                .iter()
                .map(|(idx, _record)| {
                    collection
                        .sig_for_dataset(idx)
                        .map(Signature::from)
                        .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))
                })
                .collect()
        }
        SignatureFormat::GzipJson | SignatureFormat::Json => Signature::from_path(path)
            .map_err(|err| SraSketchError::SignatureWrite(err.to_string())),
    }
}

fn stored_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default())
}

fn unique_location(used: &mut HashSet<String>, md5: &str) -> String {
    let mut location = format!("signatures/{md5}.sig.gz");
    let mut n = 1;
    while used.contains(&location) {
        location = format!("signatures/{md5}_{n}.sig.gz");
        n += 1;
    }
    used.insert(location.clone());
    location
}
