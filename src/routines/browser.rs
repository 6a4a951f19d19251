//! HTML and Markdown → PDF through a headless Chromium-class browser.
//!
//! The document is written into a [`ScratchDir`] and printed with
//! `--print-to-pdf`. Markdown is rendered to a standalone HTML page first.
//! Relative links in the source resolve against the scratch directory, so
//! they only work for self-contained documents.

use super::scratch::ScratchDir;
use super::Job;
use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::output::OutputFile;
use pulldown_cmark::{html, Options, Parser};
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Chromium-based executables looked up on `PATH`, in order.
const CHROMIUM_EXECUTABLES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
    "microsoft-edge",
    "microsoft-edge-stable",
    "brave",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const MACOS_APP_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
    "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
];

const PAGE_STYLE: &str = "body{font-family:-apple-system,'Segoe UI',Helvetica,Arial,sans-serif;\
line-height:1.5;max-width:46em;margin:0 auto;padding:1em}\
pre,code{font-family:Menlo,Consolas,monospace;background:#f6f8fa}\
pre{padding:.8em;overflow-x:auto}\
table{border-collapse:collapse}th,td{border:1px solid #d0d7de;padding:.3em .6em}\
img{max-width:100%}";

/// HTML → PDF.
pub fn html_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let html = job.text()?;
    let bytes = print_html(html, job.config)?;
    Ok(job.single(bytes))
}

/// Markdown → HTML → PDF.
pub fn markdown_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    let markdown = job.text()?;
    let page = markdown_page(markdown, job.stem);
    let bytes = print_html(&page, job.config)?;
    Ok(job.single(bytes))
}

/// Render Markdown as a standalone HTML document.
pub fn markdown_page(markdown: &str, title: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, Parser::new_ext(markdown, options));

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title>\
         <style>{PAGE_STYLE}</style></head>\n<body>\n{body}</body></html>\n",
        escape_html(title)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Print an HTML document to PDF bytes.
pub fn print_html(html: &str, config: &ConverterConfig) -> Result<Vec<u8>, ConvertError> {
    let browser = find_browser(config)?;
    let scratch = ScratchDir::new(config)?;
    let input = scratch.write("input.html", html.as_bytes())?;
    let output = scratch.path().join("output.pdf");
    let profile = scratch.path().join("profile");

    let mut cmd = Command::new(&browser);
    cmd.arg("--headless")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--no-first-run")
        .arg("--no-pdf-header-footer")
        .arg(format!("--user-data-dir={}", profile.display()))
        .arg(format!("--print-to-pdf={}", output.display()))
        .arg(file_url(&input));
    debug!("Running {:?}", cmd);

    let result = cmd.output().map_err(|e| ConvertError::ExternalToolFailed {
        tool: browser.display().to_string(),
        detail: format!("could not start: {e}"),
    })?;

    if !result.status.success() {
        return Err(ConvertError::ExternalToolFailed {
            tool: "chromium".into(),
            detail: format!("{}: {}", result.status, last_lines(&result.stderr, 5)),
        });
    }

    match scratch.read("output.pdf")? {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(ConvertError::ExternalToolFailed {
            tool: "chromium".into(),
            detail: format!("no PDF was written ({})", last_lines(&result.stderr, 5)),
        }),
    }
}

/// Locate a Chromium-class browser: configured path, `CHROME`, well-known
/// install locations, then `PATH`.
pub fn find_browser(config: &ConverterConfig) -> Result<PathBuf, ConvertError> {
    if let Some(ref path) = config.browser_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ConvertError::ExternalToolMissing {
            tool: "chromium".into(),
            hint: format!("Configured browser {} does not exist.", path.display()),
        });
    }

    if let Some(path) = std::env::var_os("CHROME").map(PathBuf::from) {
        if path.exists() {
            return Ok(path);
        }
    }

    #[cfg(target_os = "macos")]
    for path in MACOS_APP_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    for name in CHROMIUM_EXECUTABLES {
        if let Ok(path) = which::which(name) {
            debug!("Found browser {}", path.display());
            return Ok(path);
        }
    }

    Err(ConvertError::ExternalToolMissing {
        tool: "chromium".into(),
        hint: install_hint(),
    })
}

fn install_hint() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Arch:          sudo pacman -S chromium"
    };
    format!(
        "HTML and Markdown routes print through a Chromium-based browser. Install one:\n\
         {instructions}\n\
         or point CHROME (or --browser) at an existing executable."
    )
}

fn file_url(path: &std::path::Path) -> String {
    let s = path.display().to_string().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

/// The last `n` non-empty lines of a tool's stderr.
pub(crate) fn last_lines(stderr: &[u8], n: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return "no output on stderr".to_string();
    }
    lines[lines.len().saturating_sub(n)..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_renders_tables_and_strikethrough() {
        let page = markdown_page("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n", "notes");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>notes</title>"));
        assert!(page.contains("<h1>Title</h1>"));
        assert!(page.contains("<table>"));
        assert!(page.contains("<del>old</del>"));
    }

    #[test]
    fn title_is_escaped() {
        let page = markdown_page("x", "a<b>&c");
        assert!(page.contains("<title>a&lt;b&gt;&amp;c</title>"));
    }

    #[test]
    fn missing_configured_browser_is_tool_missing() {
        let config = ConverterConfig::builder()
            .browser_path("/nonexistent/chromium")
            .build()
            .expect("valid config");
        let err = find_browser(&config).unwrap_err();
        assert!(matches!(err, ConvertError::ExternalToolMissing { ref tool, .. } if tool == "chromium"));
    }

    #[test]
    fn file_urls() {
        assert_eq!(file_url(std::path::Path::new("/tmp/x/input.html")), "file:///tmp/x/input.html");
    }

    #[test]
    fn last_lines_keeps_tail() {
        assert_eq!(last_lines(b"a\n\nb\nc\n", 2), "b | c");
        assert_eq!(last_lines(b"", 3), "no output on stderr");
    }
}
