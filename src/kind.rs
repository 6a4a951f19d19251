//! File kinds: the vocabulary shared by requests, routes and outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A file format that can appear as the source or target of a conversion.
///
/// `Image` is a source-only wildcard for any raster image the decoder
/// recognises; `PageImages` is a target-only kind meaning "one raster image
/// per PDF page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Png,
    Jpg,
    Webp,
    Gif,
    Image,
    Pdf,
    PageImages,
    Ipynb,
    Txt,
    Docx,
    Html,
    Markdown,
    Csv,
    Xlsx,
    Json,
}

impl FileKind {
    /// Every kind, in display order.
    pub const ALL: [FileKind; 15] = [
        FileKind::Png,
        FileKind::Jpg,
        FileKind::Webp,
        FileKind::Gif,
        FileKind::Image,
        FileKind::Pdf,
        FileKind::PageImages,
        FileKind::Ipynb,
        FileKind::Txt,
        FileKind::Docx,
        FileKind::Html,
        FileKind::Markdown,
        FileKind::Csv,
        FileKind::Xlsx,
        FileKind::Json,
    ];

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Png => "png",
            FileKind::Jpg => "jpg",
            FileKind::Webp => "webp",
            FileKind::Gif => "gif",
            FileKind::Image => "img",
            FileKind::Pdf => "pdf",
            FileKind::PageImages => "jpg",
            FileKind::Ipynb => "ipynb",
            FileKind::Txt => "txt",
            FileKind::Docx => "docx",
            FileKind::Html => "html",
            FileKind::Markdown => "md",
            FileKind::Csv => "csv",
            FileKind::Xlsx => "xlsx",
            FileKind::Json => "json",
        }
    }

    /// MIME type suggested for downloads of this kind.
    pub fn mime(self) -> &'static str {
        match self {
            FileKind::Png => "image/png",
            FileKind::Jpg | FileKind::PageImages => "image/jpeg",
            FileKind::Webp => "image/webp",
            FileKind::Gif => "image/gif",
            FileKind::Image => "application/octet-stream",
            FileKind::Pdf => "application/pdf",
            FileKind::Ipynb => "application/x-ipynb+json",
            FileKind::Txt => "text/plain",
            FileKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileKind::Html => "text/html",
            FileKind::Markdown => "text/markdown",
            FileKind::Csv => "text/csv",
            FileKind::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileKind::Json => "application/json",
        }
    }

    /// Map a file extension (case-insensitive, with or without the dot).
    ///
    /// Returns `None` for extensions no kind claims; `Image` and
    /// `PageImages` are never returned.
    pub fn from_extension(ext: &str) -> Option<FileKind> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let kind = match ext.as_str() {
            "png" => FileKind::Png,
            "jpg" | "jpeg" => FileKind::Jpg,
            "webp" => FileKind::Webp,
            "gif" => FileKind::Gif,
            "pdf" => FileKind::Pdf,
            "ipynb" => FileKind::Ipynb,
            "txt" | "text" => FileKind::Txt,
            "docx" => FileKind::Docx,
            "html" | "htm" => FileKind::Html,
            "md" | "markdown" => FileKind::Markdown,
            "csv" => FileKind::Csv,
            "xlsx" => FileKind::Xlsx,
            "json" | "ndjson" | "jsonl" => FileKind::Json,
            _ => return None,
        };
        Some(kind)
    }

    /// Infer the kind of a path from its extension.
    pub fn from_path(path: &Path) -> Option<FileKind> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(FileKind::from_extension)
    }

    /// Whether this is a raster image kind the image decoder handles.
    pub fn is_image(self) -> bool {
        matches!(
            self,
            FileKind::Png | FileKind::Jpg | FileKind::Webp | FileKind::Gif | FileKind::Image
        )
    }

    /// Check the leading bytes of `bytes` against this kind's file signature.
    ///
    /// Text kinds only require valid UTF-8 (plus a leading `{`/`[` for JSON
    /// kinds); OOXML kinds only check the zip local-file header.
    pub fn matches_signature(self, bytes: &[u8]) -> bool {
        match self {
            FileKind::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            FileKind::Jpg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            FileKind::Webp => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            FileKind::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            FileKind::Image => [FileKind::Png, FileKind::Jpg, FileKind::Webp, FileKind::Gif]
                .iter()
                .any(|k| k.matches_signature(bytes)),
            FileKind::PageImages => {
                FileKind::Jpg.matches_signature(bytes) || FileKind::Png.matches_signature(bytes)
            }
            FileKind::Pdf => bytes.starts_with(b"%PDF"),
            FileKind::Docx | FileKind::Xlsx => bytes.starts_with(b"PK\x03\x04"),
            FileKind::Ipynb => first_non_space(bytes) == Some(b'{') && is_utf8(bytes),
            FileKind::Json => {
                matches!(first_non_space(bytes), Some(b'{') | Some(b'[')) && is_utf8(bytes)
            }
            FileKind::Html => is_utf8(bytes) && bytes.contains(&b'<'),
            FileKind::Txt | FileKind::Markdown | FileKind::Csv => is_utf8(bytes),
        }
    }
}

fn first_non_space(bytes: &[u8]) -> Option<u8> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    bytes.iter().copied().find(|b| !b.is_ascii_whitespace())
}

fn is_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileKind::Png => "PNG",
            FileKind::Jpg => "JPG",
            FileKind::Webp => "WebP",
            FileKind::Gif => "GIF",
            FileKind::Image => "Image",
            FileKind::Pdf => "PDF",
            FileKind::PageImages => "Images",
            FileKind::Ipynb => "IPYNB",
            FileKind::Txt => "TXT",
            FileKind::Docx => "DOCX",
            FileKind::Html => "HTML",
            FileKind::Markdown => "Markdown",
            FileKind::Csv => "CSV",
            FileKind::Xlsx => "XLSX",
            FileKind::Json => "JSON",
        };
        f.write_str(label)
    }
}

impl FromStr for FileKind {
    type Err = String;

    /// Parse a user-facing kind name: any extension, the display label, or
    /// `image` / `images`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "image" => Ok(FileKind::Image),
            "images" | "page-images" | "pages" => Ok(FileKind::PageImages),
            other => FileKind::from_extension(other).ok_or_else(|| {
                format!(
                    "unknown file kind '{s}' (expected one of: {})",
                    FileKind::ALL
                        .iter()
                        .map(|k| k.to_string().to_ascii_lowercase())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("jpeg".parse::<FileKind>(), Ok(FileKind::Jpg));
        assert_eq!("JPG".parse::<FileKind>(), Ok(FileKind::Jpg));
        assert_eq!("Markdown".parse::<FileKind>(), Ok(FileKind::Markdown));
        assert_eq!(".md".parse::<FileKind>(), Ok(FileKind::Markdown));
        assert_eq!("images".parse::<FileKind>(), Ok(FileKind::PageImages));
        assert_eq!("image".parse::<FileKind>(), Ok(FileKind::Image));
        assert!("exe".parse::<FileKind>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for kind in FileKind::ALL {
            let parsed: FileKind = kind.to_string().parse().expect("label parses");
            assert_eq!(parsed, kind, "label {kind}");
        }
    }

    #[test]
    fn from_path_uses_extension() {
        assert_eq!(FileKind::from_path(Path::new("a/b/Report.DOCX")), Some(FileKind::Docx));
        assert_eq!(FileKind::from_path(Path::new("notes")), None);
    }

    #[test]
    fn signatures() {
        assert!(FileKind::Pdf.matches_signature(b"%PDF-1.7\n"));
        assert!(!FileKind::Pdf.matches_signature(b"PK\x03\x04"));
        assert!(FileKind::Xlsx.matches_signature(b"PK\x03\x04rest"));
        assert!(FileKind::Json.matches_signature(b"  [{\"a\":1}]"));
        assert!(FileKind::Json.matches_signature(b"\xEF\xBB\xBF{\"a\":1}"));
        assert!(!FileKind::Json.matches_signature(b"a,b\n1,2"));
        assert!(FileKind::Webp.matches_signature(b"RIFF\x00\x00\x00\x00WEBPVP8L"));
        assert!(FileKind::Gif.matches_signature(b"GIF89a...."));
        assert!(!FileKind::Txt.matches_signature(&[0xFF, 0xFE, 0x00]));
    }
}
