//! Zip extraction.

use std::fs::{self, File};
use std::path::Path;

use hsi_core::{Error, Result};
use tracing::info;
use zip::ZipArchive;

/// Unpack `archive` into `dest`, creating it if needed.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    info!("Decompressing {}", archive.display());

    let file = File::open(archive).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(archive.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| Error::Extraction {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })?;

    fs::create_dir_all(dest)?;
    zip.extract(dest).map_err(|e| Error::Extraction {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })?;

    info!("Extracted {} entries into {}", zip.len(), dest.display());
    Ok(())
}

/// True when `dir` exists and has at least one entry.
pub fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
