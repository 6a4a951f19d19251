//! DOCX → PDF, text only.
//!
//! A `.docx` is a zip archive whose body lives in `word/document.xml`. Only
//! body-level paragraph text is carried over: runs are concatenated, `w:tab`
//! becomes a tab and `w:br`/`w:cr` become line breaks. Paragraphs inside
//! tables and text boxes, alternate renderings, images, headers/footers and
//! all formatting are dropped.

use super::{text, Job};
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

const BODY_PART: &str = "word/document.xml";

/// DOCX → PDF.
pub fn docx_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let paragraphs = extract_paragraphs(job.bytes)?;
    debug!("Extracted {} paragraphs", paragraphs.len());
    let bytes = text::render_text(&paragraphs.join("\n"), job)?;
    Ok(job.single(bytes))
}

/// Body paragraphs of a `.docx`, in document order.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConvertError::unreadable(FileKind::Docx, e))?;
    let mut xml = String::new();
    archive
        .by_name(BODY_PART)
        .map_err(|e| ConvertError::unreadable(FileKind::Docx, format!("{BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ConvertError::unreadable(FileKind::Docx, format!("{BODY_PART}: {e}")))?;
    parse_body(&xml)
}

/// Subtrees whose text never belongs to a body paragraph: tables, text boxes,
/// alternate renderings and paragraph properties (tab stops are not tabs).
const SKIPPED: &[&[u8]] = &[b"tbl", b"txbxContent", b"AlternateContent", b"pPr"];

/// Collect paragraph text from WordprocessingML.
fn parse_body(xml: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut skip_depth = 0usize;
    let mut para_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                name if SKIPPED.contains(&name) => skip_depth += 1,
                _ if skip_depth > 0 => {}
                b"p" => {
                    para_depth += 1;
                    if para_depth == 1 {
                        current.clear();
                    }
                }
                b"t" => in_text = para_depth == 1,
                name => push_special(&mut current, name, para_depth),
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                _ if skip_depth > 0 => {}
                b"p" if para_depth == 0 => paragraphs.push(String::new()),
                name => push_special(&mut current, name, para_depth),
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                name if SKIPPED.contains(&name) => skip_depth = skip_depth.saturating_sub(1),
                _ if skip_depth > 0 => {}
                b"p" => {
                    para_depth = para_depth.saturating_sub(1);
                    if para_depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text && skip_depth == 0 => {
                let text = t
                    .unescape()
                    .map_err(|e| ConvertError::unreadable(FileKind::Docx, e))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::unreadable(
                    FileKind::Docx,
                    format!("{BODY_PART} at byte {}: {e}", reader.buffer_position()),
                ))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

fn push_special(current: &mut String, name: &[u8], para_depth: usize) {
    if para_depth != 1 {
        return;
    }
    match name {
        b"tab" => current.push('\t'),
        b"br" | b"cr" => current.push('\n'),
        _ => {}
    }
}
