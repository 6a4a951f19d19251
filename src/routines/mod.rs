//! Conversion routines: one function per route family.
//!
//! Each routine receives a [`Job`] and either returns its outputs or a typed
//! [`ConvertError`]. Routines are synchronous and may block (pdfium, child
//! processes); [`crate::convert`] runs them on the blocking pool.
//!
//! ## Families
//!
//! ```text
//! raster    PNG/JPG/WebP/GIF re-encode           (image)
//! pdf       image → PDF, PDF → page images,      (pdfium-render)
//!           text pages → PDF
//! text      TXT → PDF line wrapping + pagination
//! docx      DOCX paragraph text → PDF            (zip + quick-xml)
//! tabular   CSV ↔ XLSX, JSON ↔ CSV               (csv, calamine, rust_xlsxwriter)
//! browser   HTML / Markdown → PDF                (headless Chromium, pulldown-cmark)
//! notebook  IPYNB → PDF                          (jupyter nbconvert)
//! ```
//!
//! [`scratch`] owns the per-request temp directory used by the routines that
//! hand files to external tools.

pub mod browser;
pub mod docx;
pub mod notebook;
pub mod pdf;
pub mod raster;
pub mod scratch;
pub mod tabular;
pub mod text;

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;

/// Everything a routine may look at.
#[derive(Debug)]
pub struct Job<'a> {
    pub bytes: &'a [u8],
    pub source: FileKind,
    pub target: FileKind,
    /// Sanitised stem for the suggested output name.
    pub stem: &'a str,
    pub config: &'a ConverterConfig,
}

impl Job<'_> {
    /// Wrap the bytes of a one-to-one route as `<stem>_converted.<ext>`.
    pub fn single(&self, bytes: Vec<u8>) -> Vec<OutputFile> {
        let name = format!("{}_converted.{}", self.stem, self.target.extension());
        vec![OutputFile::new(name, self.target, bytes)]
    }

    /// The source bytes as UTF-8 text, minus any byte-order mark.
    pub fn text(&self) -> Result<&str, ConvertError> {
        let bytes = self.bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(self.bytes);
        std::str::from_utf8(bytes).map_err(|e| ConvertError::unreadable(self.source, e))
    }
}

/// A conversion routine.
pub type Routine = fn(&Job<'_>) -> Result<Vec<OutputFile>, ConvertError>;
