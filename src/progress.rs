//! Progress-callback trait for per-archive and per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through a batch.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log file, or a terminal progress bar —
//! without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` because archives are processed
//! concurrently on blocking worker threads.

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes archives and pages.
///
/// Implementations must be `Send + Sync`: with `jobs > 1`, archive-level
/// events arrive concurrently from different worker threads. Page-level
/// events for a single archive are always sequential and in page order.
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any archive is opened.
    fn on_batch_start(&self, total_archives: usize) {
        let _ = total_archives;
    }

    /// Called when an archive's pages have been scanned and counted,
    /// just before normalization begins.
    fn on_archive_start(&self, archive: &Path, pages: usize) {
        let _ = (archive, pages);
    }

    /// Called after each page is normalized successfully.
    ///
    /// `ordinal` is 0-based scan order; `total` is the scanned page count.
    fn on_page_complete(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a page is rejected (corrupt image, unreadable entry).
    fn on_page_rejected(&self, entry: &str, reason: &str) {
        let _ = (entry, reason);
    }

    /// Called when an archive's PDF has been finalised.
    fn on_archive_complete(&self, archive: &Path, pages: usize, rejected: usize) {
        let _ = (archive, pages, rejected);
    }

    /// Called when an archive fails outright.
    fn on_archive_failed(&self, archive: &Path, reason: &str) {
        let _ = (archive, reason);
    }

    /// Called once after every archive has been attempted.
    fn on_batch_complete(&self, total_archives: usize, completed: usize) {
        let _ = (total_archives, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
