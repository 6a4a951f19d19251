//! Configuration for the conversion routines.
//!
//! All knobs live in [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. Defaults reproduce the behaviour a user gets
//! from the web front end without touching any setting.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration shared by every routine.
///
/// # Example
/// ```rust
/// use convertkit::{ConverterConfig, PageImageFormat};
///
/// let config = ConverterConfig::builder()
///     .page_dpi(150)
///     .page_image_format(PageImageFormat::Png)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Directory of (or full path to) the pdfium shared library.
    /// If None, `PDFIUM_LIB_PATH`, the working directory, the download cache
    /// and the system library path are tried in that order.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Fetch pdfium from pdfium-binaries when no installed copy is found.
    /// Default: true.
    pub pdfium_download: bool,

    /// Root of the pdfium download cache.
    /// If None, `CONVERTKIT_PDFIUM_CACHE_DIR`, then the platform cache directory.
    pub pdfium_cache_dir: Option<PathBuf>,

    /// Chromium-class browser used to print HTML and Markdown.
    /// If None, `CHROME` and well-known executable names on `PATH` are tried.
    pub browser_path: Option<PathBuf>,

    /// `jupyter` executable used for notebooks. Default: looked up on `PATH`.
    pub jupyter_path: Option<PathBuf>,

    /// Which nbconvert exporter renders notebooks. Default: WebPdf.
    pub notebook_engine: NotebookEngine,

    /// Parent directory for per-request scratch directories.
    /// If None, the OS temp directory is used.
    pub scratch_dir: Option<PathBuf>,

    /// DPI used when rasterising PDF pages. Range: 36–600. Default: 200.
    pub page_dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 4000.
    ///
    /// A poster-sized page at 200 DPI would otherwise allocate hundreds of
    /// megabytes of pixels.
    pub max_rendered_pixels: u32,

    /// Format of each rendered PDF page. Default: Jpg.
    pub page_image_format: PageImageFormat,

    /// JPEG quality, 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Page layout for text-to-PDF routines.
    pub layout: TextLayout,

    /// Receives start, per-page and completion events. Default: None.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            pdfium_lib_path: None,
            pdfium_download: true,
            pdfium_cache_dir: None,
            browser_path: None,
            jupyter_path: None,
            notebook_engine: NotebookEngine::default(),
            scratch_dir: None,
            page_dpi: 200,
            max_rendered_pixels: 4000,
            page_image_format: PageImageFormat::default(),
            jpeg_quality: 90,
            layout: TextLayout::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("pdfium_download", &self.pdfium_download)
            .field("pdfium_cache_dir", &self.pdfium_cache_dir)
            .field("browser_path", &self.browser_path)
            .field("jupyter_path", &self.jupyter_path)
            .field("notebook_engine", &self.notebook_engine)
            .field("scratch_dir", &self.scratch_dir)
            .field("page_dpi", &self.page_dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("page_image_format", &self.page_image_format)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("layout", &self.layout)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn pdfium_download(mut self, enabled: bool) -> Self {
        self.config.pdfium_download = enabled;
        self
    }

    pub fn pdfium_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_cache_dir = Some(dir.into());
        self
    }

    pub fn browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_path = Some(path.into());
        self
    }

    pub fn jupyter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.jupyter_path = Some(path.into());
        self
    }

    pub fn notebook_engine(mut self, engine: NotebookEngine) -> Self {
        self.config.notebook_engine = engine;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn page_dpi(mut self, dpi: u32) -> Self {
        self.config.page_dpi = dpi.clamp(36, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_image_format(mut self, format: PageImageFormat) -> Self {
        self.config.page_image_format = format;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn font_size(mut self, pt: f32) -> Self {
        self.config.layout.font_size = pt;
        self
    }

    pub fn line_height(mut self, pt: f32) -> Self {
        self.config.layout.line_height = pt;
        self
    }

    pub fn layout(mut self, layout: TextLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if !(36..=600).contains(&c.page_dpi) {
            return Err(ConvertError::InvalidConfig(format!(
                "page DPI must be 36–600, got {}",
                c.page_dpi
            )));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ConvertError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Fixed page geometry for text-to-PDF routines, in PDF points (1/72 in).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub font_size: f32,
    /// Baseline-to-baseline distance.
    pub line_height: f32,
}

impl Default for TextLayout {
    /// A4, 15 mm margins, Helvetica 12 pt on a 10 mm line.
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin: 42.5,
            font_size: 12.0,
            line_height: 28.35,
        }
    }
}

impl TextLayout {
    fn validate(&self) -> Result<(), ConvertError> {
        if self.font_size <= 0.0 || self.line_height <= 0.0 {
            return Err(ConvertError::InvalidConfig(
                "font size and line height must be positive".into(),
            ));
        }
        if self.page_width <= 2.0 * self.margin || self.page_height <= 2.0 * self.margin {
            return Err(ConvertError::InvalidConfig(format!(
                "margin {} leaves no room on a {}x{} page",
                self.margin, self.page_width, self.page_height
            )));
        }
        if self.line_height > self.page_height - 2.0 * self.margin {
            return Err(ConvertError::InvalidConfig(
                "line height exceeds the printable page height".into(),
            ));
        }
        Ok(())
    }

    /// Number of lines that fit on one page.
    pub fn lines_per_page(&self) -> usize {
        (((self.page_height - 2.0 * self.margin) / self.line_height).floor() as usize).max(1)
    }

    /// Approximate number of characters that fit on one line.
    ///
    /// Uses an average Helvetica advance of half an em.
    pub fn chars_per_line(&self) -> usize {
        let usable = self.page_width - 2.0 * self.margin;
        ((usable / (self.font_size * 0.5)).floor() as usize).max(1)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// nbconvert exporter used for notebook-to-PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotebookEngine {
    /// `--to webpdf`: print through a headless Chromium. No LaTeX needed. (default)
    #[default]
    WebPdf,
    /// `--to pdf`: render through a LaTeX toolchain (`xelatex`).
    Latex,
}

/// Raster format for PDF page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageImageFormat {
    /// JPEG (default).
    #[default]
    Jpg,
    /// Lossless PNG.
    Png,
}
