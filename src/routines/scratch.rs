//! Per-request scratch directory.
//!
//! External tools (nbconvert, Chromium) only accept file-system paths.
//! A [`ScratchDir`] wraps a `TempDir` so every file handed to or produced by
//! a tool is removed when the routine returns, on success, on error and on
//! panic alike.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A temp directory owned by one routine invocation.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `config.scratch_dir`, or under the OS
    /// temp directory if none is configured.
    pub fn new(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("convertkit-");
        let dir = match config.scratch_dir {
            Some(ref parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(ConvertError::scratch)?;

        debug!("Scratch directory: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to `name` inside the directory and return its path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).map_err(ConvertError::scratch)?;
        Ok(path)
    }

    /// Read `name` back, or `None` if the tool never created it.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, ConvertError> {
        let path = self.dir.path().join(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvertError::scratch(e)),
        }
    }
}
