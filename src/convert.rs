//! Conversion entry points.
//!
//! [`convert`] is the single boundary where failures are normalised: the
//! route is looked up, the routine runs on the blocking pool, and whatever
//! comes back (an output list, a typed error, or a panic) is turned into a
//! [`ConversionResult`]. Nothing is retried and nothing partial is returned.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionResult, ConversionStats, OutputFile, SavedFile, SavedOutput};
use crate::request::ConversionRequest;
use crate::routes;
use crate::routines::Job;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert `request` using `config`.
///
/// # Errors
/// - [`ConvertError::UnsupportedConversion`] if the pair has no route. No
///   library or tool is touched in that case.
/// - Whatever the routine reports; a panicking routine becomes
///   [`ConvertError::Internal`].
///
/// # Example
/// ```rust,no_run
/// use convertkit::{convert, ConversionRequest, ConverterConfig, FileKind};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let csv = std::fs::read("sales.csv")?;
/// let request = ConversionRequest::new(csv, FileKind::Csv, FileKind::Xlsx)
///     .with_file_name("sales.csv");
/// let output = convert(request, &ConverterConfig::default()).await?;
/// std::fs::write(&output.files[0].name, &output.files[0].bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert(request: ConversionRequest, config: &ConverterConfig) -> ConversionResult {
    let source = request.source_kind();
    let target = request.target_kind();

    let Some(routine) = routes::lookup(source, target) else {
        warn!("No route for {} → {}", source, target);
        return Err(ConvertError::UnsupportedConversion {
            source_kind: source,
            target_kind: target,
        });
    };

    let start = Instant::now();
    let input_bytes = request.source_bytes().len();
    info!("Converting {} → {} ({} bytes)", source, target, input_bytes);
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(source, target);
    }

    // pdfium and external tools block; keep them off the async workers.
    let owned_config = config.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let stem = request.output_stem();
        let job = Job {
            bytes: request.source_bytes(),
            source,
            target,
            stem: &stem,
            config: &owned_config,
        };
        routine(&job)
    })
    .await;

    let result = match joined {
        Ok(Ok(files)) if files.is_empty() => Err(ConvertError::Internal(format!(
            "{source} → {target} produced no output"
        ))),
        Ok(Ok(files)) => Ok(files),
        Ok(Err(e)) => Err(e),
        Err(e) if e.is_panic() => Err(ConvertError::Internal(format!(
            "{source} → {target} routine panicked: {}",
            panic_message(e.into_panic())
        ))),
        Err(e) => Err(ConvertError::Internal(format!("conversion task failed: {e}"))),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(files) => {
            let output_bytes: usize = files.iter().map(OutputFile::len).sum();
            info!(
                "Converted {} → {}: {} file(s), {} bytes in {}ms",
                source,
                target,
                files.len(),
                output_bytes,
                duration_ms
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_complete(files.len(), output_bytes);
            }
            Ok(ConversionOutput {
                files,
                stats: ConversionStats {
                    source_kind: source,
                    target_kind: target,
                    input_bytes,
                    output_bytes,
                    duration_ms,
                },
            })
        }
        Err(e) => {
            warn!(
                "Conversion {} → {} failed after {}ms ({}): {}",
                source,
                target,
                duration_ms,
                e.kind_name(),
                e
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(&e.to_string());
            }
            Err(e)
        }
    }
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary current-thread tokio runtime internally; do not call
/// it from inside another runtime.
pub fn convert_sync(request: ConversionRequest, config: &ConverterConfig) -> ConversionResult {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(convert(request, config))
}

/// Convert and write every output into `dir`.
///
/// Each file is written atomically (temp file + rename). If any write
/// fails, outputs already moved into place are removed again so the
/// directory never holds a partial result.
pub async fn convert_to_dir(
    request: ConversionRequest,
    dir: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<SavedOutput, ConvertError> {
    let output = convert(request, config).await?;
    let dir = dir.as_ref();

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ConvertError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut saved = Vec::with_capacity(output.files.len());
    for file in &output.files {
        match write_atomic(dir, file).await {
            Ok(path) => saved.push(SavedFile {
                name: file.name.clone(),
                mime: file.mime.clone(),
                path,
                bytes: file.len(),
            }),
            Err(e) => {
                for done in &saved {
                    if let Err(rm) = tokio::fs::remove_file(&done.path).await {
                        warn!("Could not remove {}: {}", done.path.display(), rm);
                    }
                }
                return Err(e);
            }
        }
    }

    Ok(SavedOutput {
        files: saved,
        stats: output.stats,
    })
}

async fn write_atomic(dir: &Path, file: &OutputFile) -> Result<PathBuf, ConvertError> {
    let path = dir.join(&file.name);
    let tmp_path = dir.join(format!(".{}.tmp", file.name));
    let write_failed = |e| ConvertError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    tokio::fs::write(&tmp_path, &file.bytes)
        .await
        .map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    debug!("Wrote {} ({} bytes)", path.display(), file.len());
    Ok(path)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
