//! The input side of a conversion.

use crate::kind::FileKind;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_UNSAFE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// One user action: bytes in, a declared source kind and a chosen target.
///
/// Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    source_bytes: Vec<u8>,
    source_kind: FileKind,
    target_kind: FileKind,
    file_name: Option<String>,
}

impl ConversionRequest {
    pub fn new(source_bytes: impl Into<Vec<u8>>, source_kind: FileKind, target_kind: FileKind) -> Self {
        Self {
            source_bytes: source_bytes.into(),
            source_kind,
            target_kind,
            file_name: None,
        }
    }

    /// Attach the uploaded file name; only used to name the outputs.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    pub fn source_kind(&self) -> FileKind {
        self.source_kind
    }

    pub fn target_kind(&self) -> FileKind {
        self.target_kind
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Stem used for single-output file names: the upload's name without
    /// its extension, restricted to `[A-Za-z0-9._-]`.
    pub fn output_stem(&self) -> String {
        let raw = self
            .file_name
            .as_deref()
            .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
            .map(|n| n.rsplit_once('.').map_or(n, |(stem, _)| stem))
            .unwrap_or("");
        let cleaned = RE_UNSAFE_NAME.replace_all(raw, "_");
        let cleaned = cleaned.trim_matches(|c| c == '_' || c == '.');
        if cleaned.is_empty() {
            "converted".to_string()
        } else {
            cleaned.to_string()
        }
    }
}
