//! Utility functions for file operations

use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `bytes` to `path` so that readers never observe a partial file
///
/// The bytes go to a temporary file in `dir` (which must be on the same
/// filesystem as `path`), are flushed to disk, and the temp file is then
/// renamed over `path`. On failure the temp file is removed and any previous
/// file at `path` is left untouched.
pub fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating a missing file as success
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Create a directory and its parents if they do not exist
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        tracing::info!(path = %dir.display(), "creating directory");
    }
    fs::create_dir_all(dir)?;
    Ok(())
}
