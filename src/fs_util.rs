use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::SraSketchError;

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.is_file() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

/// Reads every entry to the end so CRC mismatches surface before the archive
/// is published.
pub fn validate_zip(zip_path: &Path) -> Result<usize, SraSketchError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        SraSketchError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| SraSketchError::SignatureWrite(err.to_string()))?;
        files += 1;
    }
    Ok(files)
}

/// Deletes downloaded files, tolerating ones that are already gone.
pub fn remove_files(paths: &[PathBuf]) -> Result<usize, SraSketchError> {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("removed {}", path.display());
                removed += 1;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(SraSketchError::Filesystem(format!(
                    "remove {}: {err}",
                    path.display()
                )));
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_files_skips_missing() {
        let temp = tempfile::tempdir().unwrap();
        let present = temp.path().join("a.fastq.gz");
        fs::write(&present, b"@r\nACGT\n+\nIIII\n").unwrap();
        let missing = temp.path().join("b.fastq.gz");

        let removed = remove_files(&[present.clone(), missing]).unwrap();
        assert_eq!(removed, 1);
        assert!(!present.exists());
    }

    #[test]
    fn validate_zip_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.zip");
        fs::write(&path, b"not a zip").unwrap();
        assert!(validate_zip(&path).is_err());
    }
}
