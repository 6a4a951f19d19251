//! Output types returned by the dispatcher.

use crate::error::ConvertError;
use crate::kind::FileKind;
use serde::Serialize;
use std::path::PathBuf;

/// What `convert` hands back: the outputs, or the normalized error.
pub type ConversionResult = Result<ConversionOutput, ConvertError>;

/// One named download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    /// Suggested file name, e.g. `report_converted.pdf` or `page_3.jpg`.
    pub name: String,
    /// MIME type for the download.
    pub mime: String,
    /// The converted bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, kind: FileKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: kind.mime().to_string(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Successful result of one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Ordered outputs. One entry for most routes; one per page for
    /// PDF → images.
    pub files: Vec<OutputFile>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// The single output of a one-to-one route.
    pub fn single(&self) -> Option<&OutputFile> {
        match self.files.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Consume and return the outputs.
    pub fn into_files(self) -> Vec<OutputFile> {
        self.files
    }
}

/// Route and timing of a finished conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionStats {
    pub source_kind: FileKind,
    pub target_kind: FileKind,
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub duration_ms: u64,
}

/// One output written to disk by [`crate::convert::convert_to_dir`].
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub name: String,
    pub mime: String,
    pub path: PathBuf,
    pub bytes: usize,
}

/// Manifest of a conversion written to a directory. Serialises to the CLI's
/// `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct SavedOutput {
    pub files: Vec<SavedFile>,
    pub stats: ConversionStats,
}
