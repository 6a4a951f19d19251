//! Error type for the convertkit library.
//!
//! Every routine returns a typed [`ConvertError`]; the dispatcher in
//! [`crate::convert`] is the single place where failures (including a
//! panicking routine) are caught and handed back to the caller. Nothing
//! inside a routine retries or recovers locally.
//!
//! The `Display` output is the user-facing message. Messages for missing
//! tools carry an install hint on the following lines.

use crate::kind::FileKind;
use std::path::PathBuf;
use thiserror::Error;

/// All errors a conversion can fail with.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Routing ───────────────────────────────────────────────────────────
    /// The requested (source, target) pair has no route.
    #[error("Conversion from {source_kind} to {target_kind} is not supported.\nRun `convertkit --list-routes` to see what is.")]
    UnsupportedConversion {
        source_kind: FileKind,
        target_kind: FileKind,
    },

    // ── Input ─────────────────────────────────────────────────────────────
    /// The input bytes do not parse as the declared source kind.
    #[error("Input is not a readable {kind} file: {detail}")]
    SourceUnreadable { kind: FileKind, detail: String },

    // ── Output ────────────────────────────────────────────────────────────
    /// The target format cannot represent the decoded content, or its
    /// encoder rejected it.
    #[error("Could not encode {kind} output: {detail}")]
    EncodingFailure { kind: FileKind, detail: String },

    // ── External tools ────────────────────────────────────────────────────
    /// A renderer, binary or shared library the route depends on is absent.
    #[error("Required tool '{tool}' is not installed or could not be found.\n{hint}")]
    ExternalToolMissing { tool: String, hint: String },

    /// The tool was found and ran, but exited with an error or produced
    /// nothing.
    #[error("'{tool}' failed: {detail}")]
    ExternalToolFailed { tool: String, detail: String },

    // ── Output files ──────────────────────────────────────────────────────
    /// Writing a converted file to disk failed.
    #[error("Failed to write output file {path}: {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Scratch I/O failure or a routine that panicked.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Stable short label for logs and JSON manifests.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ConvertError::UnsupportedConversion { .. } => "unsupported_conversion",
            ConvertError::SourceUnreadable { .. } => "source_unreadable",
            ConvertError::EncodingFailure { .. } => "encoding_failure",
            ConvertError::ExternalToolMissing { .. } => "external_tool_missing",
            ConvertError::ExternalToolFailed { .. } => "external_tool_failed",
            ConvertError::OutputWriteFailed { .. } => "output_write_failed",
            ConvertError::InvalidConfig(_) => "invalid_config",
            ConvertError::Internal(_) => "internal",
        }
    }

    pub(crate) fn unreadable(kind: FileKind, detail: impl ToString) -> Self {
        ConvertError::SourceUnreadable {
            kind,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn encoding(kind: FileKind, detail: impl ToString) -> Self {
        ConvertError::EncodingFailure {
            kind,
            detail: detail.to_string(),
        }
    }

    pub(crate) fn scratch(err: std::io::Error) -> Self {
        ConvertError::Internal(format!("scratch file: {err}"))
    }
}
