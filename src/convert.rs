//! Per-archive conversion entry points.
//!
//! The pipeline for one archive is strictly sequential — page order inside a
//! document is a correctness requirement — and entirely CPU- or disk-bound,
//! so the async entry points here are thin wrappers that move the work onto
//! `spawn_blocking` threads. Parallelism lives one level up, in
//! [`crate::batch`], which runs several archives at once.

use crate::config::ConversionConfig;
use crate::error::Cb2PdfError;
use crate::output::{ConversionOutput, ConversionStats, PageWarning};
use crate::pipeline::archive::{inspect_archive, ArchiveInfo, ArchiveReader};
use crate::pipeline::normalize::Normalizer;
use crate::pipeline::{assemble, scan};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a single archive to a PDF placed next to it (or in
/// `config.output_dir`), named after the archive's stem.
///
/// # Returns
/// `Ok(ConversionOutput)` on success, even if some pages were rejected
/// (check `output.warnings`).
///
/// # Errors
/// Returns `Err(Cb2PdfError)` only for archive-fatal conditions: unreadable
/// or unsupported container, no pages at all, assembly failure.
pub async fn convert(
    archive: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cb2PdfError> {
    let archive = archive.as_ref().to_path_buf();
    let target = output_target(&archive, config);
    convert_to_file(archive, target, config).await
}

/// Convert a single archive, writing the PDF to an explicit path.
///
/// The output is finalised atomically: either a complete document appears
/// at `target` or nothing does.
pub async fn convert_to_file(
    archive: impl AsRef<Path>,
    target: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cb2PdfError> {
    let archive = archive.as_ref().to_path_buf();
    let target = target.as_ref().to_path_buf();
    let config = config.clone();
    tokio::task::spawn_blocking(move || convert_blocking(&archive, &target, &config))
        .await
        .map_err(|e| Cb2PdfError::Internal(format!("conversion task panicked: {e}")))?
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    archive: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cb2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Cb2PdfError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(convert(archive, config))
}

/// Inspect an archive without converting: kind, entry count, and the page
/// list in reading order. Rar archives are listed without extraction.
pub async fn inspect(archive: impl AsRef<Path>) -> Result<ArchiveInfo, Cb2PdfError> {
    let archive = archive.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || inspect_archive(&archive, None))
        .await
        .map_err(|e| Cb2PdfError::Internal(format!("inspect task panicked: {e}")))?
}

/// Derive the output path: `<archive stem>.pdf` in the configured output
/// directory, or next to the archive.
pub(crate) fn output_target(archive: &Path, config: &ConversionConfig) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = config
        .output_dir
        .clone()
        .or_else(|| archive.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(format!("{stem}.pdf"))
}

/// The full archive pipeline, blocking. Runs on a worker thread.
///
/// Workspace lifecycle: the reader owns any extraction workspace and drops
/// it on every exit path of this function, error returns included.
pub(crate) fn convert_blocking(
    archive: &Path,
    target: &Path,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Cb2PdfError> {
    let total_start = Instant::now();
    info!(archive = %archive.display(), "starting conversion");

    // ── Open container and list entries ──────────────────────────────────
    let extract_start = Instant::now();
    let mut reader = ArchiveReader::open(archive, config.unrar_path.as_deref())?;
    let kind = reader.kind();
    let entry_names = reader.entry_names();
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Scan: filter and order pages ──────────────────────────────────────
    let pages = scan::scan_pages(&entry_names);
    if pages.is_empty() {
        return Err(Cb2PdfError::NoPagesFound {
            path: archive.to_path_buf(),
        });
    }
    let scanned_pages = pages.len();
    debug!(
        archive = %archive.display(),
        entries = entry_names.len(),
        pages = scanned_pages,
        "scanned page entries"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_start(archive, scanned_pages);
    }

    // ── Normalize pages one at a time ─────────────────────────────────────
    let normalize_start = Instant::now();
    let mut normalizer = Normalizer::new(config);
    let mut normalized = Vec::with_capacity(scanned_pages);
    let mut warnings: Vec<PageWarning> = Vec::new();
    let mut downscaled_pages = 0;

    for entry in &pages {
        // Raw bytes and decode buffers live only for this iteration.
        let result = reader
            .read_entry(&entry.name)
            .and_then(|bytes| normalizer.normalize_page(&entry.name, &bytes, entry.ordinal));
        match result {
            Ok(page) => {
                if page.downscaled {
                    downscaled_pages += 1;
                }
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(entry.ordinal, scanned_pages);
                }
                normalized.push(page);
            }
            Err(error) => {
                warn!(archive = %archive.display(), %error, "page rejected");
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_rejected(&entry.name, &error.to_string());
                }
                warnings.push(PageWarning {
                    entry: entry.name.clone(),
                    ordinal: entry.ordinal,
                    error,
                });
            }
        }
    }
    // Explicit pooled-resource release: nothing sized for this archive's
    // pages survives into the next one.
    normalizer.reset();
    let normalize_duration_ms = normalize_start.elapsed().as_millis() as u64;

    // ── Assemble and finalise ─────────────────────────────────────────────
    let assemble_start = Instant::now();
    let assembled_pages = normalized.len();
    let title = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output_bytes = assemble::assemble(normalized, archive, target, &title)?;
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        total_entries: entry_names.len(),
        scanned_pages,
        assembled_pages,
        rejected_pages: warnings.len(),
        downscaled_pages,
        output_bytes,
        extract_duration_ms,
        normalize_duration_ms,
        assemble_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        archive = %archive.display(),
        pages = assembled_pages,
        rejected = stats.rejected_pages,
        ms = stats.total_duration_ms,
        "conversion complete"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_archive_complete(archive, assembled_pages, stats.rejected_pages);
    }

    Ok(ConversionOutput {
        archive: archive.to_path_buf(),
        kind,
        output: target.to_path_buf(),
        page_count: assembled_pages,
        warnings,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_defaults_next_to_archive() {
        let config = ConversionConfig::default();
        assert_eq!(
            output_target(Path::new("/books/Vol 1.cbz"), &config),
            PathBuf::from("/books/Vol 1.pdf")
        );
    }

    #[test]
    fn target_honours_output_dir() {
        let config = ConversionConfig::builder()
            .output_dir("/out")
            .build()
            .unwrap();
        assert_eq!(
            output_target(Path::new("/books/vol_2.cbr"), &config),
            PathBuf::from("/out/vol_2.pdf")
        );
    }

    #[test]
    fn bare_filename_stays_relative() {
        let config = ConversionConfig::default();
        assert_eq!(
            output_target(Path::new("book.cbz"), &config),
            PathBuf::from("book.pdf")
        );
    }
}
