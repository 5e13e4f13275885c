//! Output files, one per resource key

use crate::error::Result;
use crate::types::ResourceKey;
use crate::utils::write_atomic;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Writes pipeline results to `{output_dir}/type_{key}.txt`
#[derive(Clone, Debug)]
pub struct Persister {
    output_dir: PathBuf,
}

impl Persister {
    /// Create a persister for `output_dir`
    ///
    /// The directory is not created here; see [`crate::utils::ensure_dir`].
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory receiving output files
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output path for `key`
    pub fn path_for(&self, key: ResourceKey) -> PathBuf {
        self.output_dir.join(format!("type_{}.txt", key))
    }

    /// Serialize `data` as one compact JSON value and write it for `key`
    ///
    /// The whole document is serialized before anything touches the disk, then
    /// written through a temp file and renamed into place. A missing or
    /// unwritable output directory fails with [`Error::Io`](crate::Error::Io) and
    /// leaves any previous file unchanged.
    pub fn save<T: Serialize + ?Sized>(&self, data: &T, key: ResourceKey) -> Result<PathBuf> {
        let bytes = serde_json::to_vec(data)?;
        let path = self.path_for(key);

        write_atomic(&self.output_dir, &path, &bytes)?;

        tracing::info!(
            key = key.get(),
            path = %path.display(),
            size_bytes = bytes.len(),
            "saved output"
        );
        Ok(path)
    }
}
