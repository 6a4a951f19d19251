//! Plain text → PDF.
//!
//! Layout is deliberately simple: one fixed font size, one fixed line
//! height, word wrapping to the usable width, and a new page whenever the
//! current one is full. There is no widow/orphan control and no hyphenation.

use super::{pdf, Job};
use crate::config::TextLayout;
use crate::error::ConvertError;
use crate::output::OutputFile;
use tracing::debug;

const TAB_WIDTH: usize = 4;

/// TXT → PDF.
pub fn txt_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let text = job.text()?;
    let bytes = render_text(text, job)?;
    Ok(job.single(bytes))
}

/// Lay `text` out and write it as a PDF with the job's layout.
pub(crate) fn render_text(text: &str, job: &Job<'_>) -> Result<Vec<u8>, ConvertError> {
    let layout = &job.config.layout;
    let pages = paginate(&wrap_text(text, layout.chars_per_line()), layout);
    debug!("Laid out {} pages of text", pages.len());
    pdf::write_text_pages(&pages, job.config)
}

/// Split `text` into display lines no longer than `width` characters.
///
/// Each source line becomes at least one display line (blank lines are
/// kept). Lines wrap at spaces; a word longer than `width` is hard-broken.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let line = expand_tabs(raw.strip_suffix('\r').unwrap_or(raw));
        wrap_line(&line, width, &mut lines);
    }
    // A trailing newline does not start another line.
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    let line = line.trim_end();
    if line.chars().count() <= width {
        out.push(line.to_string());
        return;
    }

    let mut current = String::new();
    let mut current_len = 0;
    for word in line.split(' ') {
        let word_len = word.chars().count();
        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
        if needed <= width {
            if current_len > 0 {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
            continue;
        }

        if current_len > 0 {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(width).peekable();
        while let Some(chunk) = chunks.next() {
            if chunks.peek().is_some() {
                out.push(chunk.iter().collect());
            } else {
                current = chunk.iter().collect();
                current_len = chunk.len();
            }
        }
    }
    if current_len > 0 || out.is_empty() {
        out.push(current);
    }
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + TAB_WIDTH);
    let mut col = 0;
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB_WIDTH - col % TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(c);
            col += 1;
        }
    }
    out
}

/// Group display lines into pages. Always returns at least one page.
pub fn paginate(lines: &[String], layout: &TextLayout) -> Vec<Vec<String>> {
    let per_page = layout.lines_per_page();
    let pages: Vec<Vec<String>> = lines.chunks(per_page).map(|c| c.to_vec()).collect();
    if pages.is_empty() {
        vec![Vec::new()]
    } else {
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_pass_through() {
        assert_eq!(wrap_text("a\nb\n\nc", 10), vec!["a", "b", "", "c"]);
    }

    #[test]
    fn trailing_newline_and_crlf() {
        assert_eq!(wrap_text("one\r\ntwo\r\n", 10), vec!["one", "two"]);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(
            wrap_text("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn hard_breaks_long_words() {
        assert_eq!(wrap_text("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn tabs_expand_to_stops() {
        assert_eq!(wrap_text("a\tb", 20), vec!["a   b"]);
        assert_eq!(wrap_text("\tx", 20), vec!["    x"]);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(wrap_text("ééé ééé", 3), vec!["ééé", "ééé"]);
    }

    #[test]
    fn paginate_overflows_to_new_page() {
        let layout = TextLayout::default();
        let per_page = layout.lines_per_page();
        let lines: Vec<String> = (0..per_page + 1).map(|i| i.to_string()).collect();
        let pages = paginate(&lines, &layout);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), per_page);
        assert_eq!(pages[1], vec![per_page.to_string()]);
    }

    #[test]
    fn empty_text_is_one_blank_page() {
        let pages = paginate(&wrap_text("", 80), &TextLayout::default());
        assert_eq!(pages.len(), 1);
    }
}
