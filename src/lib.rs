//! # convertkit
//!
//! Convert files between common formats: raster images, PDF, notebooks,
//! text and markup documents, and tabular data.
//!
//! The crate is a dispatcher. Each supported `(source, target)` pair maps to
//! one routine that delegates the real work to a library (`image`,
//! `pdfium-render`, `csv`, `calamine`, `rust_xlsxwriter`) or an external tool
//! (headless Chromium, `jupyter nbconvert`). Unsupported pairs are rejected
//! before anything is invoked.
//!
//! ## Routes
//!
//! ```text
//! PNG  → JPG, WebP, PDF        CSV   → XLSX, JSON
//! JPG  → PNG, PDF              XLSX  → CSV
//! WebP → PNG, PDF              JSON  → CSV
//! GIF  → PNG, PDF              TXT   → PDF
//! Image (any) → PDF            DOCX  → PDF   (text only)
//! PDF  → page images           HTML  → PDF   (Chromium)
//! IPYNB → PDF (nbconvert)      Markdown → PDF (Chromium)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use convertkit::{convert, ConversionRequest, ConverterConfig, FileKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("photo.png")?;
//!     let request = ConversionRequest::new(bytes, FileKind::Png, FileKind::Jpg)
//!         .with_file_name("photo.png");
//!     let output = convert(request, &ConverterConfig::default()).await?;
//!     for file in &output.files {
//!         std::fs::write(&file.name, &file.bytes)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `convertkit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime dependencies
//!
//! PDF routes load the pdfium shared library at runtime. An installed copy
//! (`PDFIUM_LIB_PATH`, the working directory, the system path) is preferred;
//! otherwise [`pdfium::bind`] downloads a prebuilt one into the user cache on
//! first use.
//! HTML and Markdown need a Chromium-based browser; notebooks need
//! `jupyter nbconvert`. A missing one fails only the routes that use it, with
//! [`ConvertError::ExternalToolMissing`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod kind;
pub mod output;
pub mod pdfium;
pub mod progress;
pub mod request;
pub mod routes;
pub mod routines;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, NotebookEngine, PageImageFormat, TextLayout};
pub use convert::{convert, convert_sync, convert_to_dir};
pub use error::ConvertError;
pub use kind::FileKind;
pub use output::{ConversionOutput, ConversionResult, ConversionStats, OutputFile, SavedFile, SavedOutput};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::ConversionRequest;
pub use routes::{is_supported, routes, targets_for};
