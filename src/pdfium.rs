//! Locating, fetching and binding the pdfium shared library.
//!
//! Every PDF route renders or writes through pdfium, a C++ library loaded at
//! runtime. [`bind`] tries, in order:
//!
//! 1. `config.pdfium_lib_path` (a file, or a directory holding the platform
//!    library),
//! 2. `PDFIUM_LIB_PATH`,
//! 3. the working directory,
//! 4. the download cache (see [`cache_dir`]),
//! 5. the system library path,
//! 6. a one-time download of the matching build from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//!    into the cache, unless `config.pdfium_download` is off.
//!
//! Only when all of them fail does a route report
//! [`ConvertError::ExternalToolMissing`]. The download is written to a temp
//! file in the cache directory and renamed into place, so a concurrent or
//! interrupted fetch never leaves a truncated library behind.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use pdfium_render::prelude::Pdfium;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// pdfium-binaries release tag fetched on demand.
pub const PDFIUM_VERSION: &str = "7690";

const BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const PDFIUM_HINT: &str = "PDF routes need the pdfium shared library.\n\
Download a build for your platform from https://github.com/bblanchon/pdfium-binaries\n\
and either place it next to the executable or set PDFIUM_LIB_PATH=/path/to/dir.";

/// Serialises downloads within the process.
static DOWNLOAD: Mutex<()> = Mutex::new(());

struct Platform {
    archive: &'static str,
    member: &'static str,
}

fn detect_platform() -> Option<Platform> {
    let (archive, member) = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", "lib/libpdfium.dylib"),
        ("macos", "x86_64") => ("pdfium-mac-x64.tgz", "lib/libpdfium.dylib"),
        ("linux", "x86_64") => ("pdfium-linux-x64.tgz", "lib/libpdfium.so"),
        ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", "lib/libpdfium.so"),
        ("windows", "x86_64") => ("pdfium-win-x64.tgz", "bin/pdfium.dll"),
        ("windows", "aarch64") => ("pdfium-win-arm64.tgz", "bin/pdfium.dll"),
        ("windows", "x86") => ("pdfium-win-x86.tgz", "bin/pdfium.dll"),
        _ => return None,
    };
    Some(Platform { archive, member })
}

fn library_name() -> String {
    format!("{DLL_PREFIX}pdfium{DLL_SUFFIX}")
}

/// Per-version directory holding a downloaded library.
///
/// `config.pdfium_cache_dir`, else `CONVERTKIT_PDFIUM_CACHE_DIR`, else the
/// platform cache directory (`~/.cache/convertkit` on Linux).
pub fn cache_dir(config: &ConverterConfig) -> PathBuf {
    let base = config
        .pdfium_cache_dir
        .clone()
        .or_else(|| std::env::var_os("CONVERTKIT_PDFIUM_CACHE_DIR").map(PathBuf::from))
        .unwrap_or_else(|| {
            dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(std::env::temp_dir)
                .join("convertkit")
        });
    base.join(format!("pdfium-{PDFIUM_VERSION}"))
}

/// Library files that exist on disk, most specific first. Does not include
/// the system path or anything that needs a download.
pub fn local_candidates(config: &ConverterConfig) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(ref path) = config.pdfium_lib_path {
        candidates.push(library_file(path));
    }
    if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH") {
        candidates.push(library_file(Path::new(&path)));
    }
    candidates.push(library_file(Path::new(".")));
    candidates.push(cache_dir(config).join(library_name()));
    candidates.retain(|p| p.is_file());
    candidates
}

/// Bind to a pdfium shared library, downloading one if nothing is installed.
///
/// Blocks on network I/O the first time; call it from a blocking context.
pub fn bind(config: &ConverterConfig) -> Result<Pdfium, ConvertError> {
    for lib in local_candidates(config) {
        match Pdfium::bind_to_library(lib.to_string_lossy().to_string()) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => debug!("Could not bind pdfium at {}: {:?}", lib.display(), e),
        }
    }

    let system_err = match Pdfium::bind_to_system_library() {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(e) => e,
    };

    if !config.pdfium_download {
        return Err(missing(format!("(system lookup: {system_err:?})")));
    }
    let lib = download_library(config)?;
    Pdfium::bind_to_library(lib.to_string_lossy().to_string())
        .map(Pdfium::new)
        .map_err(|e| missing(format!("(downloaded {} but binding failed: {e:?})", lib.display())))
}

/// Fetch the platform build into [`cache_dir`] unless it is already there,
/// and return the library path.
pub fn download_library(config: &ConverterConfig) -> Result<PathBuf, ConvertError> {
    let platform = detect_platform().ok_or_else(|| {
        missing(format!(
            "(no prebuilt pdfium for {}/{})",
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    })?;
    let dir = cache_dir(config);
    let dest = dir.join(library_name());

    let _guard = DOWNLOAD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if dest.is_file() {
        return Ok(dest);
    }

    let url = format!("{BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", platform.archive);
    info!("Downloading pdfium {} from {}", PDFIUM_VERSION, url);
    std::fs::create_dir_all(&dir)
        .map_err(|e| missing(format!("(cannot create cache dir {}: {e})", dir.display())))?;

    let archive = fetch(&url, config).map_err(|e| missing(format!("(automatic download failed: {e})")))?;
    extract_library(&archive, platform.member, &dest)
        .map_err(|e| missing(format!("(automatic download failed: {e})")))?;

    info!("pdfium cached at {}", dest.display());
    Ok(dest)
}

fn fetch(url: &str, config: &ConverterConfig) -> Result<Vec<u8>, String> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("convertkit/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| e.to_string())?;

    let mut response = client.get(url).send().map_err(|e| format!("GET {url}: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("HTTP {} for {url}", response.status()));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut chunk = vec![0u8; 64 * 1024];
    let mut downloaded = 0u64;
    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                downloaded += n as u64;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_pdfium_download(downloaded, total);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(format!("read error: {e}")),
        }
    }
    Ok(buf)
}

/// Copy `member` out of a gzipped tarball to `dest`, atomically.
fn extract_library(archive: &[u8], member: &str, dest: &Path) -> Result<(), String> {
    let dir = dest.parent().ok_or("destination has no parent directory")?;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));

    for entry in tar.entries().map_err(|e| e.to_string())? {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path().map_err(|e| e.to_string())?;
        if path.to_string_lossy().trim_start_matches("./") != member {
            continue;
        }

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
        std::io::copy(&mut entry, &mut tmp).map_err(|e| format!("unpack {member}: {e}"))?;
        tmp.persist(dest)
            .map_err(|e| format!("move into {}: {e}", dest.display()))?;
        return Ok(());
    }
    warn!("pdfium archive did not contain {}", member);
    Err(format!("'{member}' not found in archive"))
}

/// A directory means "the platform library name inside it".
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(library_name())
    } else {
        path.to_path_buf()
    }
}

fn missing(detail: String) -> ConvertError {
    ConvertError::ExternalToolMissing {
        tool: "pdfium".into(),
        hint: format!("{PDFIUM_HINT}\n{detail}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).expect("append entry");
        }
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip")
    }

    fn config_with_cache(dir: &Path) -> ConverterConfig {
        ConverterConfig::builder()
            .pdfium_cache_dir(dir)
            .pdfium_download(false)
            .build()
            .expect("valid config")
    }

    #[test]
    fn current_platform_has_a_build() {
        assert!(detect_platform().is_some());
    }

    #[test]
    fn cache_dir_is_versioned_under_configured_root() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = cache_dir(&config_with_cache(root.path()));
        assert_eq!(dir, root.path().join(format!("pdfium-{PDFIUM_VERSION}")));
    }

    #[test]
    fn extracts_only_the_library_member() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join(library_name());
        let archive = tarball(&[
            ("include/fpdfview.h", b"header"),
            ("lib/libpdfium.so", b"ELF library bytes"),
        ]);

        extract_library(&archive, "lib/libpdfium.so", &dest).expect("extract");
        assert_eq!(std::fs::read(&dest).expect("read"), b"ELF library bytes");
        let names: Vec<_> = std::fs::read_dir(dir.path()).expect("list").collect();
        assert_eq!(names.len(), 1, "temp files left behind: {names:?}");
    }

    #[test]
    fn missing_member_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = tarball(&[("lib/other.so", b"x")]);
        let err = extract_library(&archive, "lib/libpdfium.so", &dir.path().join("lib")).unwrap_err();
        assert!(err.contains("not found"), "got: {err}");
        assert!(!dir.path().join("lib").exists());
    }

    #[test]
    fn cached_library_is_a_local_candidate() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_cache(root.path());
        let cached = cache_dir(&config).join(library_name());
        std::fs::create_dir_all(cached.parent().expect("parent")).expect("mkdir");
        std::fs::write(&cached, b"stub").expect("write");

        assert!(local_candidates(&config).contains(&cached));
    }

    #[test]
    fn download_reuses_cached_library() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_with_cache(root.path());
        let cached = cache_dir(&config).join(library_name());
        std::fs::create_dir_all(cached.parent().expect("parent")).expect("mkdir");
        std::fs::write(&cached, b"stub").expect("write");

        assert_eq!(download_library(&config).expect("cached"), cached);
    }

    #[test]
    fn directory_maps_to_platform_library_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = library_file(dir.path());
        assert_eq!(file, dir.path().join(library_name()));
    }

    #[test]
    fn explicit_file_path_is_kept() {
        let path = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(path), path.to_path_buf());
    }

    #[test]
    fn missing_library_hint_points_at_binaries() {
        let err = missing("(system lookup: not found)".into());
        assert_eq!(err.kind_name(), "external_tool_missing");
        assert!(err.to_string().contains("pdfium-binaries"), "got: {err}");
    }
}
