//! The static route table: `(source kind, target kind) → routine`.
//!
//! Built once on first use and never mutated, so lookups need no locking.

use crate::kind::FileKind;
use crate::routines::{browser, docx, notebook, pdf, raster, tabular, text, Routine};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Every supported pair, in the order `routes()` lists them.
const DECLARED: &[(FileKind, FileKind, Routine)] = &[
    (FileKind::Png, FileKind::Jpg, raster::convert_image),
    (FileKind::Png, FileKind::Webp, raster::convert_image),
    (FileKind::Png, FileKind::Pdf, pdf::image_to_pdf),
    (FileKind::Jpg, FileKind::Png, raster::convert_image),
    (FileKind::Jpg, FileKind::Pdf, pdf::image_to_pdf),
    (FileKind::Webp, FileKind::Png, raster::convert_image),
    (FileKind::Webp, FileKind::Pdf, pdf::image_to_pdf),
    (FileKind::Gif, FileKind::Png, raster::convert_image),
    (FileKind::Gif, FileKind::Pdf, pdf::image_to_pdf),
    (FileKind::Image, FileKind::Pdf, pdf::image_to_pdf),
    (FileKind::Pdf, FileKind::PageImages, pdf::pdf_to_images),
    (FileKind::Ipynb, FileKind::Pdf, notebook::notebook_to_pdf),
    (FileKind::Txt, FileKind::Pdf, text::txt_to_pdf),
    (FileKind::Docx, FileKind::Pdf, docx::docx_to_pdf),
    (FileKind::Html, FileKind::Pdf, browser::html_to_pdf),
    (FileKind::Markdown, FileKind::Pdf, browser::markdown_to_pdf),
    (FileKind::Csv, FileKind::Xlsx, tabular::csv_to_xlsx),
    (FileKind::Csv, FileKind::Json, tabular::csv_to_json),
    (FileKind::Xlsx, FileKind::Csv, tabular::xlsx_to_csv),
    (FileKind::Json, FileKind::Csv, tabular::json_to_csv),
];

static ROUTES: Lazy<HashMap<(FileKind, FileKind), Routine>> = Lazy::new(|| {
    DECLARED
        .iter()
        .map(|&(source, target, routine)| ((source, target), routine))
        .collect()
});

pub(crate) fn lookup(source: FileKind, target: FileKind) -> Option<Routine> {
    ROUTES.get(&(source, target)).copied()
}

/// All supported `(source, target)` pairs, in a stable order.
pub fn routes() -> impl Iterator<Item = (FileKind, FileKind)> {
    DECLARED.iter().map(|&(source, target, _)| (source, target))
}

pub fn is_supported(source: FileKind, target: FileKind) -> bool {
    ROUTES.contains_key(&(source, target))
}

/// Targets reachable from `source`, in table order.
pub fn targets_for(source: FileKind) -> Vec<FileKind> {
    routes().filter(|&(s, _)| s == source).map(|(_, t)| t).collect()
}
