//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to hear when
//! a conversion starts, when each PDF page has been rendered, and when the
//! outputs are ready. Only PDF → images reports pages; every other route
//! fires just the start and completion events.
//!
//! # Example
//!
//! ```rust
//! use convertkit::{ConversionProgressCallback, ConverterConfig};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ConversionProgressCallback for Log {
//!     fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
//!         eprintln!("page {page_num}/{total_pages}");
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use crate::kind::FileKind;
use std::sync::Arc;

/// Called by the dispatcher and the page renderer.
///
/// Routines run on the blocking pool, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the route has been found, before the routine runs.
    fn on_conversion_start(&self, source: FileKind, target: FileKind) {
        let _ = (source, target);
    }

    /// Called after each PDF page is rasterised and encoded.
    ///
    /// `page_num` is 1-indexed.
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when the routine has produced `file_count` outputs totalling
    /// `output_bytes`.
    fn on_conversion_complete(&self, file_count: usize, output_bytes: usize) {
        let _ = (file_count, output_bytes);
    }

    /// Called as the pdfium library is downloaded on first use.
    ///
    /// `total` is None when the server does not send a length.
    fn on_pdfium_download(&self, downloaded: u64, total: Option<u64>) {
        let _ = (downloaded, total);
    }

    /// Called when the conversion fails, with the error's display text.
    fn on_conversion_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
