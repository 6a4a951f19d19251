//! Jupyter notebook → PDF via `jupyter nbconvert`.
//!
//! The notebook is only checked for shape (a JSON object with a `cells`
//! array); rendering is left entirely to nbconvert. Two exporters are
//! supported:
//!
//! | engine   | nbconvert flag  | needs                          |
//! |----------|-----------------|--------------------------------|
//! | `WebPdf` | `--to webpdf`   | nbconvert[webpdf] + Chromium   |
//! | `Latex`  | `--to pdf`      | nbconvert + xelatex            |
//!
//! nbconvert reports a missing renderer only through stderr, so failures are
//! classified from its text: a missing Chromium or xelatex becomes
//! [`ConvertError::ExternalToolMissing`], anything else
//! [`ConvertError::ExternalToolFailed`].

use super::browser::last_lines;
use super::scratch::ScratchDir;
use super::Job;
use crate::config::{ConverterConfig, NotebookEngine};
use crate::error::ConvertError;
use crate::kind::FileKind;
use crate::output::OutputFile;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

const OUTPUT_STEM: &str = "converted";

/// IPYNB → PDF.
pub fn notebook_to_pdf(job: &Job<'_>) -> Result<Vec<OutputFile>, ConvertError> {
    validate_notebook(job.text()?)?;

    let config = job.config;
    let jupyter = find_jupyter(config)?;
    if config.notebook_engine == NotebookEngine::Latex {
        which::which("xelatex").map_err(|_| missing_xelatex())?;
    }

    let scratch = ScratchDir::new(config)?;
    let input = scratch.write("notebook.ipynb", job.bytes)?;

    let mut cmd = Command::new(&jupyter);
    cmd.arg("nbconvert")
        .arg("--to")
        .arg(exporter(config.notebook_engine))
        .arg("--TemplateExporter.exclude_input_prompt=True")
        .arg("--TemplateExporter.exclude_output_prompt=True")
        .arg("--output")
        .arg(OUTPUT_STEM)
        .arg("--output-dir")
        .arg(scratch.path())
        .arg(&input);
    debug!("Running {:?}", cmd);

    let result = cmd.output().map_err(|e| ConvertError::ExternalToolFailed {
        tool: "jupyter".into(),
        detail: format!("could not start {}: {e}", jupyter.display()),
    })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(classify_failure(&stderr, config.notebook_engine));
    }

    match scratch.read(&format!("{OUTPUT_STEM}.pdf"))? {
        Some(bytes) if !bytes.is_empty() => {
            info!("nbconvert produced {} bytes", bytes.len());
            Ok(job.single(bytes))
        }
        _ => Err(ConvertError::ExternalToolFailed {
            tool: "jupyter".into(),
            detail: format!("nbconvert wrote no PDF ({})", last_lines(&result.stderr, 5)),
        }),
    }
}

/// Reject input that is JSON but not a notebook before spawning anything.
pub fn validate_notebook(text: &str) -> Result<(), ConvertError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ConvertError::unreadable(FileKind::Ipynb, e))?;
    match value.get("cells") {
        Some(Value::Array(_)) => Ok(()),
        _ => Err(ConvertError::unreadable(
            FileKind::Ipynb,
            "not a notebook: missing the \"cells\" array",
        )),
    }
}

fn exporter(engine: NotebookEngine) -> &'static str {
    match engine {
        NotebookEngine::WebPdf => "webpdf",
        NotebookEngine::Latex => "pdf",
    }
}

/// The configured `jupyter`, or the one on `PATH`.
pub fn find_jupyter(config: &ConverterConfig) -> Result<PathBuf, ConvertError> {
    if let Some(ref path) = config.jupyter_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ConvertError::ExternalToolMissing {
            tool: "jupyter".into(),
            hint: format!("Configured jupyter {} does not exist.", path.display()),
        });
    }
    which::which("jupyter").map_err(|_| ConvertError::ExternalToolMissing {
        tool: "jupyter".into(),
        hint: "Notebook conversion runs `jupyter nbconvert`. Install it with:\n  \
               pip install 'nbconvert[webpdf]'\n  \
               playwright install chromium"
            .into(),
    })
}

/// Map nbconvert's stderr to the error the user can act on.
///
/// Only the final line is inspected: it carries the Python exception, while
/// the frames above it name `jupyter-nbconvert` and the exporter modules on
/// every failure.
pub fn classify_failure(stderr: &str, engine: NotebookEngine) -> ConvertError {
    let tail = last_lines(stderr.as_bytes(), 5);
    let last = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match engine {
        NotebookEngine::WebPdf if is_missing_chromium(&last) => {
            return ConvertError::ExternalToolMissing {
                tool: "chromium".into(),
                hint: format!(
                    "nbconvert's WebPDF exporter needs a headless Chromium:\n  \
                     pip install 'nbconvert[webpdf]'\n  \
                     playwright install chromium\n({tail})"
                ),
            };
        }
        NotebookEngine::Latex if last.contains("xelatex") && last.contains("not found") => {
            return missing_xelatex();
        }
        _ => {}
    }

    if is_missing_nbconvert(&last) {
        return ConvertError::ExternalToolMissing {
            tool: "nbconvert".into(),
            hint: "Install it with: pip install 'nbconvert[webpdf]'".into(),
        };
    }
    ConvertError::ExternalToolFailed {
        tool: "jupyter".into(),
        detail: tail,
    }
}

fn is_missing_chromium(last: &str) -> bool {
    last.contains("no suitable chromium executable")
        || last.contains("playwright is not installed")
        || (last.contains("executable doesn't exist") && last.contains("ms-playwright"))
}

fn is_missing_nbconvert(last: &str) -> bool {
    last.contains("`jupyter-nbconvert` not found")
        || last.contains("'nbconvert' is not a jupyter command")
        || last.contains("error executing jupyter command 'nbconvert'")
        || last.contains("no module named nbconvert")
        || last.contains("no module named 'nbconvert'")
}

fn missing_xelatex() -> ConvertError {
    ConvertError::ExternalToolMissing {
        tool: "xelatex".into(),
        hint: "The LaTeX notebook engine needs xelatex (TeX Live or MiKTeX).\n\
               Install it, or use the default WebPdf engine."
            .into(),
    }
}
