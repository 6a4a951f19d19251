//! End-to-end tests through the public `convert` API.
//!
//! Every sample is generated in-test. Routes that need a Chromium browser or
//! `jupyter nbconvert` print `SKIP` and return when the tool is not
//! installed. pdfium is downloaded into the user cache on first use, so PDF
//! routes are skipped only when that fails too (offline, no prebuilt build).
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use convertkit::routines::{browser, notebook};
use convertkit::{
    convert, convert_to_dir, routes, ConversionRequest, ConvertError, ConverterConfig, FileKind,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Binding may download, so it runs on the blocking pool.
async fn pdfium_available(config: &ConverterConfig) -> bool {
    let config = config.clone();
    tokio::task::spawn_blocking(move || convertkit::pdfium::bind(&config).is_ok())
        .await
        .expect("bind task")
}

fn browser_available(config: &ConverterConfig) -> bool {
    browser::find_browser(config).is_ok()
}

fn jupyter_available(config: &ConverterConfig) -> bool {
    notebook::find_jupyter(config).is_ok()
}

/// Skip this test if the pdfium shared library cannot be bound.
macro_rules! skip_unless_pdfium {
    ($config:expr) => {{
        if !pdfium_available($config).await {
            println!("SKIP: pdfium not available (set PDFIUM_LIB_PATH)");
            return;
        }
    }};
}

const CSV: &str = "id,name,price,in_stock\n1,widget,2.5,true\n2,gadget,10,false\n3,gizmo,,true\n";

fn png_bytes() -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(8, 6, Rgba([30, 120, 200, 255]));
    img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
    encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode sample image");
    buf
}

fn image_sample(format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 6, Rgba([200, 60, 20, 255]));
    encode(DynamicImage::ImageRgba8(img), format)
}

fn docx_bytes() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", SimpleFileOptions::default())
        .expect("start entry");
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Quarterly report</w:t></w:r></w:p>
<w:p><w:r><w:t>Revenue grew.</w:t></w:r></w:p>
</w:body></w:document>"#,
    )
    .expect("write entry");
    zip.finish().expect("finish zip").into_inner()
}

const NOTEBOOK: &str = r##"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": ["# Hello"]},
  {"cell_type": "code", "execution_count": 1, "metadata": {}, "outputs": [], "source": ["1 + 1"]}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}"##;

async fn xlsx_bytes() -> Vec<u8> {
    let request = ConversionRequest::new(CSV, FileKind::Csv, FileKind::Xlsx);
    convert(request, &ConverterConfig::default())
        .await
        .expect("CSV → XLSX")
        .files
        .remove(0)
        .bytes
}

/// A multi-page PDF made by the TXT → PDF route.
async fn pdf_bytes(config: &ConverterConfig, pages: usize) -> Vec<u8> {
    let lines = config.layout.lines_per_page() * (pages - 1) + 1;
    let text: String = (1..=lines).map(|i| format!("line {i}\n")).collect();
    let request = ConversionRequest::new(text, FileKind::Txt, FileKind::Pdf);
    convert(request, config)
        .await
        .expect("TXT → PDF")
        .files
        .remove(0)
        .bytes
}

async fn sample(kind: FileKind, config: &ConverterConfig) -> Vec<u8> {
    match kind {
        FileKind::Png | FileKind::Image => png_bytes(),
        FileKind::Jpg => image_sample(ImageFormat::Jpeg),
        FileKind::Webp => image_sample(ImageFormat::WebP),
        FileKind::Gif => image_sample(ImageFormat::Gif),
        FileKind::Pdf => pdf_bytes(config, 2).await,
        FileKind::Ipynb => NOTEBOOK.as_bytes().to_vec(),
        FileKind::Txt => b"Plain text\n\twith a tab\n".to_vec(),
        FileKind::Docx => docx_bytes(),
        FileKind::Html => b"<!DOCTYPE html><html><body><h1>Hi</h1><p>there</p></body></html>".to_vec(),
        FileKind::Markdown => b"# Title\n\n* one\n* two\n".to_vec(),
        FileKind::Csv => CSV.as_bytes().to_vec(),
        FileKind::Xlsx => xlsx_bytes().await,
        FileKind::Json => br#"[{"a":1,"b":"x"},{"a":2,"b":"y"}]"#.to_vec(),
        FileKind::PageImages => unreachable!("PageImages is never a source"),
    }
}

/// Which external tool a route depends on, if any, and whether it is here.
async fn tool_for(source: FileKind, target: FileKind, config: &ConverterConfig) -> Option<(&'static str, bool)> {
    match (source, target) {
        (FileKind::Html | FileKind::Markdown, _) => Some(("chromium", browser_available(config))),
        (FileKind::Ipynb, _) => Some(("jupyter", jupyter_available(config))),
        (FileKind::Pdf, _) | (_, FileKind::Pdf) => Some(("pdfium", pdfium_available(config).await)),
        _ => None,
    }
}

fn read_csv(bytes: &[u8]) -> Vec<Vec<String>> {
    csv::Reader::from_reader(bytes)
        .records()
        .map(|r| r.expect("csv record").iter().map(str::to_string).collect())
        .collect()
}

// ── Every declared pair ──────────────────────────────────────────────────────

#[tokio::test]
async fn every_route_produces_target_signature() {
    init_tracing();
    let config = ConverterConfig::default();
    let mut checked = 0;

    for (source, target) in routes() {
        if let Some((tool, false)) = tool_for(source, target, &config).await {
            println!("SKIP {source} → {target}: {tool} not available");
            continue;
        }

        let bytes = sample(source, &config).await;
        let request = ConversionRequest::new(bytes, source, target).with_file_name("sample.bin");
        let output = match convert(request, &config).await {
            Ok(output) => output,
            // nbconvert may be installed without its Chromium or LaTeX backend.
            Err(ConvertError::ExternalToolMissing { tool, .. }) if source == FileKind::Ipynb => {
                println!("SKIP {source} → {target}: {tool} not available");
                continue;
            }
            Err(e) => panic!("{source} → {target} failed: {e}"),
        };

        assert!(!output.files.is_empty(), "{source} → {target}: no outputs");
        for file in &output.files {
            assert!(
                target.matches_signature(&file.bytes),
                "{source} → {target}: {} does not look like {target}",
                file.name
            );
        }
        if target != FileKind::PageImages {
            assert_eq!(output.files[0].name, format!("sample_converted.{}", target.extension()));
        }
        checked += 1;
    }

    println!("checked {checked} routes");
    assert!(checked >= 6, "the pure-Rust routes always run");
}

// ── Tabular ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn csv_xlsx_csv_round_trip() {
    let config = ConverterConfig::default();
    let xlsx = convert(ConversionRequest::new(CSV, FileKind::Csv, FileKind::Xlsx), &config)
        .await
        .expect("CSV → XLSX")
        .files
        .remove(0);
    assert_eq!(
        xlsx.mime,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );

    let back = convert(ConversionRequest::new(xlsx.bytes, FileKind::Xlsx, FileKind::Csv), &config)
        .await
        .expect("XLSX → CSV")
        .files
        .remove(0);

    let text = String::from_utf8(back.bytes).expect("utf8 csv");
    assert!(text.starts_with("id,name,price,in_stock\n"), "header lost: {text}");
    assert_eq!(read_csv(text.as_bytes()), read_csv(CSV.as_bytes()));
}

#[tokio::test]
async fn json_csv_json_keeps_records() {
    let config = ConverterConfig::default();
    let json = "{\"city\":\"Oslo\",\"pop\":709000}\n{\"city\":\"Bergen\",\"pop\":291000}\n";

    let csv = convert(ConversionRequest::new(json, FileKind::Json, FileKind::Csv), &config)
        .await
        .expect("JSON → CSV")
        .files
        .remove(0);
    assert_eq!(String::from_utf8_lossy(&csv.bytes), "city,pop\nOslo,709000\nBergen,291000\n");

    let again = convert(ConversionRequest::new(csv.bytes, FileKind::Csv, FileKind::Json), &config)
        .await
        .expect("CSV → JSON")
        .files
        .remove(0);
    assert_eq!(String::from_utf8_lossy(&again.bytes), json);
}

// ── Determinism ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn deterministic_routes_are_byte_identical() {
    let config = ConverterConfig::default();
    let cases = [
        (png_bytes(), FileKind::Png, FileKind::Jpg),
        (png_bytes(), FileKind::Png, FileKind::Webp),
        (image_sample(ImageFormat::Gif), FileKind::Gif, FileKind::Png),
        (CSV.as_bytes().to_vec(), FileKind::Csv, FileKind::Xlsx),
        (CSV.as_bytes().to_vec(), FileKind::Csv, FileKind::Json),
    ];
    for (bytes, source, target) in cases {
        let first = convert(ConversionRequest::new(bytes.clone(), source, target), &config)
            .await
            .expect("first run");
        let second = convert(ConversionRequest::new(bytes, source, target), &config)
            .await
            .expect("second run");
        assert_eq!(
            first.files[0].bytes, second.files[0].bytes,
            "{source} → {target} is not deterministic"
        );
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_to_xlsx_is_unsupported() {
    // A tool path that does not exist proves nothing was looked up.
    let config = ConverterConfig::builder()
        .pdfium_lib_path("/nonexistent/libpdfium.so")
        .build()
        .expect("valid config");
    let err = convert(ConversionRequest::new(docx_bytes(), FileKind::Docx, FileKind::Xlsx), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::UnsupportedConversion {
            source_kind: FileKind::Docx,
            target_kind: FileKind::Xlsx
        }
    ));
}

#[tokio::test]
async fn garbage_input_is_source_unreadable() {
    let config = ConverterConfig::default();
    for (source, target) in [
        (FileKind::Png, FileKind::Jpg),
        (FileKind::Xlsx, FileKind::Csv),
        (FileKind::Json, FileKind::Csv),
    ] {
        let err = convert(ConversionRequest::new(b"\x00garbage".to_vec(), source, target), &config)
            .await
            .unwrap_err();
        assert_eq!(err.kind_name(), "source_unreadable", "{source} → {target}: {err}");
    }
}

#[tokio::test]
async fn missing_jupyter_is_reported_and_leaves_no_scratch_files() {
    let scratch = tempfile::tempdir().expect("scratch parent");
    let config = ConverterConfig::builder()
        .jupyter_path("/nonexistent/bin/jupyter")
        .scratch_dir(scratch.path())
        .build()
        .expect("valid config");

    let err = convert(ConversionRequest::new(NOTEBOOK, FileKind::Ipynb, FileKind::Pdf), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ConvertError::ExternalToolMissing { ref tool, .. } if tool == "jupyter"),
        "got: {err}"
    );

    let left: Vec<_> = std::fs::read_dir(scratch.path()).expect("list").collect();
    assert!(left.is_empty(), "scratch files left behind: {left:?}");
}

/// Write an executable `jupyter` stand-in that runs `body` after reading
/// `--output-dir` into `$out`.
#[cfg(unix)]
fn fake_jupyter(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("jupyter");
    let script = format!(
        "#!/bin/sh\n\
         out=\"\"\n\
         while [ $# -gt 0 ]; do\n\
         \x20 if [ \"$1\" = \"--output-dir\" ]; then out=\"$2\"; fi\n\
         \x20 shift\n\
         done\n\
         {body}\n"
    );
    std::fs::write(&path, script).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[cfg(unix)]
#[tokio::test]
async fn failed_nbconvert_cleans_up_partial_output() {
    let bin = tempfile::tempdir().expect("bin dir");
    let scratch = tempfile::tempdir().expect("scratch parent");
    let jupyter = fake_jupyter(
        bin.path(),
        "printf '%%PDF-1.7 partial' > \"$out/converted.pdf\"\n\
         echo 'Traceback (most recent call last):' >&2\n\
         echo '  File \"/usr/local/bin/jupyter-nbconvert\", line 8, in <module>' >&2\n\
         echo 'RuntimeError: No suitable chromium executable found on the system.' >&2\n\
         exit 1",
    );
    let config = ConverterConfig::builder()
        .jupyter_path(&jupyter)
        .scratch_dir(scratch.path())
        .build()
        .expect("valid config");

    let err = convert(ConversionRequest::new(NOTEBOOK, FileKind::Ipynb, FileKind::Pdf), &config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, ConvertError::ExternalToolMissing { ref tool, .. } if tool == "chromium"),
        "got: {err}"
    );

    let left: Vec<_> = std::fs::read_dir(scratch.path()).expect("list").collect();
    assert!(left.is_empty(), "scratch files left behind: {left:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn nbconvert_output_is_returned_and_scratch_removed() {
    let bin = tempfile::tempdir().expect("bin dir");
    let scratch = tempfile::tempdir().expect("scratch parent");
    let jupyter = fake_jupyter(
        bin.path(),
        "printf '%%PDF-1.7\\n%%%%EOF\\n' > \"$out/converted.pdf\"",
    );
    let config = ConverterConfig::builder()
        .jupyter_path(&jupyter)
        .scratch_dir(scratch.path())
        .build()
        .expect("valid config");

    let output = convert(
        ConversionRequest::new(NOTEBOOK, FileKind::Ipynb, FileKind::Pdf).with_file_name("analysis.ipynb"),
        &config,
    )
    .await
    .expect("IPYNB → PDF");
    assert_eq!(output.files[0].name, "analysis_converted.pdf");
    assert!(FileKind::Pdf.matches_signature(&output.files[0].bytes));

    let left: Vec<_> = std::fs::read_dir(scratch.path()).expect("list").collect();
    assert!(left.is_empty(), "scratch files left behind: {left:?}");
}

#[tokio::test]
async fn missing_browser_is_reported() {
    let config = ConverterConfig::builder()
        .browser_path("/nonexistent/chromium")
        .build()
        .expect("valid config");
    let err = convert(
        ConversionRequest::new("# hi", FileKind::Markdown, FileKind::Pdf),
        &config,
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind_name(), "external_tool_missing");
}

// ── PDF routes (need pdfium) ─────────────────────────────────────────────────

#[tokio::test]
async fn three_page_pdf_yields_three_ordered_images() {
    init_tracing();
    let config = ConverterConfig::builder().page_dpi(72).build().expect("valid config");
    skip_unless_pdfium!(&config);

    let pdf = pdf_bytes(&config, 3).await;
    let output = convert(ConversionRequest::new(pdf, FileKind::Pdf, FileKind::PageImages), &config)
        .await
        .expect("PDF → images");

    let names: Vec<&str> = output.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["page_1.jpg", "page_2.jpg", "page_3.jpg"]);
    for file in &output.files {
        assert!(FileKind::Jpg.matches_signature(&file.bytes), "{}", file.name);
        assert_eq!(file.mime, "image/jpeg");
    }
}

#[tokio::test]
async fn page_images_respect_format_and_pixel_cap() {
    let config = ConverterConfig::builder()
        .page_image_format(convertkit::PageImageFormat::Png)
        .max_rendered_pixels(300)
        .build()
        .expect("valid config");
    skip_unless_pdfium!(&config);

    let pdf = pdf_bytes(&config, 1).await;
    let output = convert(ConversionRequest::new(pdf, FileKind::Pdf, FileKind::PageImages), &config)
        .await
        .expect("PDF → images");

    assert_eq!(output.files.len(), 1);
    assert_eq!(output.files[0].name, "page_1.png");
    let img = image::load_from_memory(&output.files[0].bytes).expect("decode page");
    assert!(img.width().max(img.height()) <= 300, "{}x{}", img.width(), img.height());
}

#[tokio::test]
async fn docx_text_reaches_the_pdf() {
    let config = ConverterConfig::default();
    skip_unless_pdfium!(&config);

    let output = convert(ConversionRequest::new(docx_bytes(), FileKind::Docx, FileKind::Pdf), &config)
        .await
        .expect("DOCX → PDF");
    let bytes = output.files[0].bytes.clone();
    let text = tokio::task::spawn_blocking(move || {
        let pdfium = convertkit::pdfium::bind(&config).expect("bind");
        let document = pdfium.load_pdf_from_byte_slice(&bytes, None).expect("load output");
        let page = document.pages().get(0).expect("first page");
        let text = page.text().expect("page text").all();
        text
    })
    .await
    .expect("text task");
    assert!(text.contains("Quarterly report"), "got: {text}");
}

#[tokio::test]
async fn pdf_outputs_written_to_directory() {
    let config = ConverterConfig::builder().page_dpi(72).build().expect("valid config");
    skip_unless_pdfium!(&config);

    let dir = tempfile::tempdir().expect("tempdir");
    let pdf = pdf_bytes(&config, 2).await;
    let saved = convert_to_dir(
        ConversionRequest::new(pdf, FileKind::Pdf, FileKind::PageImages).with_file_name("deck.pdf"),
        dir.path(),
        &config,
    )
    .await
    .expect("write pages");

    assert_eq!(saved.files.len(), 2);
    for file in &saved.files {
        assert!(file.path.exists(), "{} missing", file.path.display());
    }
}
