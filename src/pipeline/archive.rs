//! Archive reading: open a zip- or rar-based container and yield entries.
//!
//! ## Why sniff content instead of trusting extensions?
//!
//! `.cbz`/`.cbr` files in the wild are frequently mislabelled — a `.cbr`
//! that is really a zip is common because packagers rename blindly. Kind
//! detection therefore reads magic bytes: attempt the zip signature first,
//! fall back to the rar signature, and report `UnsupportedArchive` with the
//! offending bytes otherwise.
//!
//! ## Why an external unrar binary?
//!
//! Rar decompression is patent-encumbered and the reference implementation
//! is the `unrar` tool, which is what every comic-reader ecosystem ships
//! with. We probe for it at runtime (`CB2PDF_UNRAR` env var, then `PATH`)
//! and surface a distinguishable, actionable [`Cb2PdfError::ToolUnavailable`]
//! instead of a generic failure. [`rar_support`] is exported so a CLI can
//! pre-flight and warn before starting a batch.
//!
//! Zip entries are read lazily one at a time straight out of the container;
//! rar archives are extracted once into a scoped [`TempDir`] workspace that
//! is released when the reader drops, on every exit path.

use crate::error::{Cb2PdfError, PageError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Container kind, detected from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    /// Zip-based (`.cbz` and friends).
    Zip,
    /// Rar-based (`.cbr` and friends).
    Rar,
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::Zip => write!(f, "zip"),
            ArchiveKind::Rar => write!(f, "rar"),
        }
    }
}

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
// Empty zip archives start with the end-of-central-directory record.
const ZIP_EMPTY_MAGIC: &[u8; 4] = b"PK\x05\x06";
// Shared prefix of the RAR4 and RAR5 signatures.
const RAR_MAGIC: &[u8; 7] = b"Rar!\x1a\x07\x00";

/// Sniff the container kind from the first bytes of the file.
///
/// Zip is attempted first, rar second; anything else is
/// [`Cb2PdfError::UnsupportedArchive`].
pub fn detect_kind(path: &Path) -> Result<ArchiveKind, Cb2PdfError> {
    let mut file = open_checked(path)?;
    let mut magic = [0u8; 8];
    let mut n = 0;
    // Plain read() may legally return short; fill the header buffer until EOF.
    while n < magic.len() {
        match file.read(&mut magic[n..]) {
            Ok(0) => break,
            Ok(read) => n += read,
            Err(e) => {
                return Err(Cb2PdfError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: format!("could not read file header: {e}"),
                })
            }
        }
    }

    if n >= 4 && (&magic[..4] == ZIP_MAGIC || &magic[..4] == ZIP_EMPTY_MAGIC) {
        return Ok(ArchiveKind::Zip);
    }
    if n >= 7 && magic[..6] == RAR_MAGIC[..6] {
        return Ok(ArchiveKind::Rar);
    }

    // Short reads leave the untouched tail zeroed, which is fine for the
    // diagnostic in the error message.
    let mut first = [0u8; 4];
    first.copy_from_slice(&magic[..4]);
    Err(Cb2PdfError::UnsupportedArchive {
        path: path.to_path_buf(),
        magic: first,
    })
}

/// Open a file, mapping the usual io errors to the archive taxonomy.
fn open_checked(path: &Path) -> Result<File, Cb2PdfError> {
    match File::open(path) {
        Ok(f) => Ok(f),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Cb2PdfError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(Cb2PdfError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

// ── unrar tool resolution ────────────────────────────────────────────────

/// Resolve the unrar binary: explicit override, `CB2PDF_UNRAR`, then `PATH`.
pub fn unrar_tool(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = override_path {
        return p.is_file().then(|| p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("CB2PDF_UNRAR") {
        if !env_path.is_empty() {
            let p = PathBuf::from(env_path);
            return p.is_file().then_some(p);
        }
    }
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for name in ["unrar", "unrar.exe"] {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Capability probe: can this host extract rar-based archives?
///
/// Exposed so the surrounding CLI can pre-flight a batch containing `.cbr`
/// files and warn before any work starts.
pub fn rar_support() -> bool {
    unrar_tool(None).is_some()
}

fn tool_unavailable() -> Cb2PdfError {
    Cb2PdfError::ToolUnavailable {
        tool: "unrar".into(),
        hint: "Install unrar and make sure it is on PATH, or point CB2PDF_UNRAR \
               (or --unrar) at the binary."
            .into(),
    }
}

/// List entry names of a rar archive via `unrar lb` without extracting.
fn rar_list(tool: &Path, path: &Path) -> Result<Vec<String>, Cb2PdfError> {
    let output = Command::new(tool)
        .arg("lb")
        .arg("--")
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tool_unavailable()
            } else {
                Cb2PdfError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: format!("failed to run unrar: {e}"),
                }
            }
        })?;
    if !output.status.success() {
        return Err(Cb2PdfError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: format!(
                "unrar lb exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

// ── Reader ───────────────────────────────────────────────────────────────

enum Inner {
    Zip {
        archive: ZipArchive<File>,
    },
    Rar {
        /// Scoped extraction workspace; removed when the reader drops,
        /// including on error paths and early returns.
        workspace: TempDir,
    },
}

/// Reader over a zip- or rar-based container.
///
/// Yields entry names up front and entry bytes one at a time on demand, so
/// only a single raw entry is ever materialised in memory.
pub struct ArchiveReader {
    kind: ArchiveKind,
    inner: Inner,
}

impl ArchiveReader {
    /// Open an archive, detecting its kind from content.
    ///
    /// For rar-based archives the whole container is extracted into a scoped
    /// temp workspace (rar has no cheap random access through the external
    /// tool); zip entries stay inside the container and are decompressed
    /// lazily.
    pub fn open(path: &Path, unrar_override: Option<&Path>) -> Result<Self, Cb2PdfError> {
        let kind = detect_kind(path)?;
        debug!(archive = %path.display(), %kind, "detected container kind");
        match kind {
            ArchiveKind::Zip => {
                let file = open_checked(path)?;
                let archive =
                    ZipArchive::new(file).map_err(|e| Cb2PdfError::ExtractionFailed {
                        path: path.to_path_buf(),
                        detail: format!("corrupt zip container: {e}"),
                    })?;
                Ok(Self {
                    kind,
                    inner: Inner::Zip { archive },
                })
            }
            ArchiveKind::Rar => {
                let tool =
                    unrar_tool(unrar_override).ok_or_else(tool_unavailable)?;
                let workspace = TempDir::new().map_err(|e| Cb2PdfError::Internal(format!(
                    "could not create extraction workspace: {e}"
                )))?;
                extract_rar(&tool, path, workspace.path())?;
                info!(archive = %path.display(), "extracted rar archive to workspace");
                Ok(Self {
                    kind,
                    inner: Inner::Rar { workspace },
                })
            }
        }
    }

    /// Detected container kind.
    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    /// All file entry names, with `/`-separated relative paths.
    ///
    /// Directory entries are excluded. Order is whatever the container
    /// stores; the page scanner imposes the real ordering.
    pub fn entry_names(&self) -> Vec<String> {
        match &self.inner {
            Inner::Zip { archive } => archive
                .file_names()
                .filter(|n| !n.ends_with('/') && !n.ends_with('\\'))
                .map(String::from)
                .collect(),
            Inner::Rar { workspace } => {
                let root = workspace.path();
                WalkDir::new(root)
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .filter_map(|entry| {
                        entry
                            .path()
                            .strip_prefix(root)
                            .ok()
                            .map(relative_name)
                    })
                    .collect()
            }
        }
    }

    /// Read one entry's bytes. Failures are page-level, never archive-fatal:
    /// a truncated member must not take down the rest of the book.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, PageError> {
        match &mut self.inner {
            Inner::Zip { archive } => {
                let mut entry = archive.by_name(name).map_err(|e| PageError::ReadFailed {
                    entry: name.to_string(),
                    detail: e.to_string(),
                })?;
                let mut buf = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut buf)
                    .map_err(|e| PageError::ReadFailed {
                        entry: name.to_string(),
                        detail: e.to_string(),
                    })?;
                Ok(buf)
            }
            Inner::Rar { workspace } => {
                std::fs::read(workspace.path().join(name)).map_err(|e| PageError::ReadFailed {
                    entry: name.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }
}

/// Quick structural summary of an archive, for inspection without converting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub kind: ArchiveKind,
    /// Raw file entries in the container.
    pub total_entries: usize,
    /// Entry names that the page scanner would keep, in page order.
    pub page_names: Vec<String>,
}

/// Inspect an archive without extracting page bytes.
///
/// Zip archives are listed from the central directory; rar archives are
/// listed via `unrar lb`, so no extraction workspace is created.
pub fn inspect_archive(
    path: &Path,
    unrar_override: Option<&Path>,
) -> Result<ArchiveInfo, Cb2PdfError> {
    let kind = detect_kind(path)?;
    let names: Vec<String> = match kind {
        ArchiveKind::Zip => {
            let file = open_checked(path)?;
            let archive = ZipArchive::new(file).map_err(|e| Cb2PdfError::ExtractionFailed {
                path: path.to_path_buf(),
                detail: format!("corrupt zip container: {e}"),
            })?;
            archive
                .file_names()
                .filter(|n| !n.ends_with('/'))
                .map(String::from)
                .collect()
        }
        ArchiveKind::Rar => {
            let tool = unrar_tool(unrar_override).ok_or_else(tool_unavailable)?;
            rar_list(&tool, path)?
        }
    };
    let pages = crate::pipeline::scan::scan_pages(&names);
    Ok(ArchiveInfo {
        path: path.to_path_buf(),
        kind,
        total_entries: names.len(),
        page_names: pages.into_iter().map(|p| p.name).collect(),
    })
}

/// Run `unrar x` into the workspace directory.
fn extract_rar(tool: &Path, path: &Path, dest: &Path) -> Result<(), Cb2PdfError> {
    // unrar treats the last argument as a destination only when it ends
    // with a path separator; otherwise it is parsed as a file mask.
    let mut dest_arg = dest.as_os_str().to_os_string();
    dest_arg.push(std::path::MAIN_SEPARATOR.to_string());

    let output = Command::new(tool)
        .arg("x")
        .arg("-o+")
        .arg("-p-")
        .arg("--")
        .arg(path)
        .arg(&dest_arg)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                tool_unavailable()
            } else {
                Cb2PdfError::ExtractionFailed {
                    path: path.to_path_buf(),
                    detail: format!("failed to run unrar: {e}"),
                }
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(archive = %path.display(), %stderr, "unrar extraction failed");
        return Err(Cb2PdfError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: format!("unrar exited with {}: {}", output.status, stderr.trim()),
        });
    }
    Ok(())
}

/// Join path components with `/` so zip and rar entries share one naming
/// scheme regardless of platform separators.
fn relative_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    fn minimal_zip(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        let file = File::create(&p).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("a.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();
        p
    }

    #[test]
    fn detects_zip_by_magic_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = minimal_zip(dir.path(), "mislabeled.cbr");
        assert_eq!(detect_kind(&p).unwrap(), ArchiveKind::Zip);
    }

    #[test]
    fn detects_rar_by_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "book.cbr", b"Rar!\x1a\x07\x01\x00rest");
        assert_eq!(detect_kind(&p).unwrap(), ArchiveKind::Rar);
    }

    #[test]
    fn rejects_unknown_magic() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "notes.cbz", b"this is not an archive");
        match detect_kind(&p) {
            Err(Cb2PdfError::UnsupportedArchive { magic, .. }) => {
                assert_eq!(&magic, b"this");
            }
            other => panic!("expected UnsupportedArchive, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_file_not_found() {
        match detect_kind(Path::new("/no/such/archive.cbz")) {
            Err(Cb2PdfError::FileNotFound { .. }) => {}
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn zip_reader_lists_and_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let p = minimal_zip(dir.path(), "one.cbz");
        let mut reader = ArchiveReader::open(&p, None).unwrap();
        assert_eq!(reader.kind(), ArchiveKind::Zip);
        let names = reader.entry_names();
        assert_eq!(names, vec!["a.txt".to_string()]);
        assert_eq!(reader.read_entry("a.txt").unwrap(), b"hello");
    }

    #[test]
    fn zip_missing_entry_is_page_level() {
        let dir = tempfile::tempdir().unwrap();
        let p = minimal_zip(dir.path(), "one.cbz");
        let mut reader = ArchiveReader::open(&p, None).unwrap();
        match reader.read_entry("nope.png") {
            Err(PageError::ReadFailed { entry, .. }) => assert_eq!(entry, "nope.png"),
            other => panic!("expected ReadFailed, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_zip_is_extraction_failed() {
        let dir = tempfile::tempdir().unwrap();
        // Valid local-file magic followed by garbage and no central directory.
        let p = write_file(dir.path(), "broken.cbz", b"PK\x03\x04garbagegarbage");
        match ArchiveReader::open(&p, None) {
            Err(Cb2PdfError::ExtractionFailed { .. }) => {}
            Err(other) => panic!("expected ExtractionFailed, got {other:?}"),
            Ok(_) => panic!("expected ExtractionFailed, got a reader"),
        }
    }

    #[test]
    fn rar_without_tool_is_tool_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let p = write_file(dir.path(), "book.cbr", b"Rar!\x1a\x07\x00data");
        // An override pointing at nothing makes the probe fail deterministically
        // even on hosts that have unrar installed.
        match ArchiveReader::open(&p, Some(Path::new("/no/such/unrar"))) {
            Err(Cb2PdfError::ToolUnavailable { tool, .. }) => assert_eq!(tool, "unrar"),
            Err(other) => panic!("expected ToolUnavailable, got {other:?}"),
            Ok(_) => panic!("expected ToolUnavailable, got a reader"),
        }
    }

    #[test]
    fn relative_names_use_forward_slashes() {
        let rel = Path::new("vol1").join("ch2").join("p3.jpg");
        assert_eq!(relative_name(&rel), "vol1/ch2/p3.jpg");
    }
}
