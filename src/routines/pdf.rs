//! PDF routines backed by pdfium: rasterise pages, build PDFs from images
//! and from laid-out text.
//!
//! ## Binding
//!
//! Every routine here binds through [`crate::pdfium::bind`], which finds an
//! installed library or downloads one into the cache. Failure is reported as
//! [`ConvertError::ExternalToolMissing`] so every pdfium-backed route fails
//! the same way when the library is absent.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 200 DPI would produce a
//! 6,600 × 9,300 px bitmap. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use super::{raster, Job};
use crate::config::{ConverterConfig, PageImageFormat};
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;
use crate::pdfium::bind;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// PDF → one raster image per page, named `page_1.jpg`, `page_2.jpg`, …
pub fn pdf_to_images(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let config = job.config;
    let (kind, ext) = match config.page_image_format {
        PageImageFormat::Jpg => (FileKind::Jpg, "jpg"),
        PageImageFormat::Png => (FileKind::Png, "png"),
    };

    let pdfium = bind(config)?;
    let document = pdfium
        .load_pdf_from_byte_slice(job.bytes, None)
        .map_err(load_error)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let max_pixels = config.max_rendered_pixels as i32;
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(config.page_dpi as f32 / 72.0)
        .set_maximum_width(max_pixels)
        .set_maximum_height(max_pixels);

    let mut outputs = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ConvertError::encoding(kind, format!("rasterisation of page {page_num} failed: {e:?}")))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        let bytes = raster::encode(&image, kind, config.jpeg_quality)?;
        outputs.push(OutputFile::new(format!("page_{page_num}.{ext}"), kind, bytes));

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_rendered(page_num, total_pages);
        }
    }

    if outputs.is_empty() {
        return Err(ConvertError::unreadable(FileKind::Pdf, "document has no pages"));
    }
    Ok(outputs)
}

/// Image → single-page PDF sized to the image at 72 DPI.
pub fn image_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let img = raster::decode(job.bytes, job.source)?;
    let flat = image::DynamicImage::ImageRgb8(raster::flatten(&img));

    let pdfium = bind(job.config)?;
    let mut document = pdfium.create_new_pdf().map_err(pdf_write_error)?;

    let width = PdfPoints::new(flat.width() as f32);
    let height = PdfPoints::new(flat.height() as f32);
    {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(width, height))
            .map_err(pdf_write_error)?;
        page.objects_mut()
            .create_image_object(PdfPoints::ZERO, PdfPoints::ZERO, &flat, Some(width), Some(height))
            .map_err(pdf_write_error)?;
    }

    let bytes = document.save_to_bytes().map_err(pdf_write_error)?;
    Ok(job.single(bytes))
}

/// Write pre-laid-out pages of text, one string per line, as a PDF.
pub(crate) fn write_text_pages(pages: &[Vec<String>], config: &ConverterConfig) -> Result<Vec<u8>, ConvertError> {
    let layout = &config.layout;
    let pdfium = bind(config)?;
    let mut document = pdfium.create_new_pdf().map_err(pdf_write_error)?;
    let font = document.fonts_mut().helvetica();

    let size = PdfPagePaperSize::Custom(
        PdfPoints::new(layout.page_width),
        PdfPoints::new(layout.page_height),
    );
    let first_baseline = layout.page_height - layout.margin - layout.font_size;

    for lines in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(size)
            .map_err(pdf_write_error)?;
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let y = first_baseline - i as f32 * layout.line_height;
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(layout.margin),
                    PdfPoints::new(y),
                    line,
                    font,
                    PdfPoints::new(layout.font_size),
                )
                .map_err(pdf_write_error)?;
        }
    }

    document.save_to_bytes().map_err(pdf_write_error)
}

fn load_error(e: PdfiumError) -> ConvertError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        ConvertError::unreadable(FileKind::Pdf, "document is encrypted and needs a password")
    } else {
        ConvertError::unreadable(FileKind::Pdf, detail)
    }
}

fn pdf_write_error(e: PdfiumError) -> ConvertError {
    ConvertError::encoding(FileKind::Pdf, format!("{e:?}"))
}
