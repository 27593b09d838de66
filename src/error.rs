//! Error types for the cb2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Cb2PdfError`] — **Fatal for one archive**: the conversion of that
//!   archive cannot proceed (unreadable container, no unrar tool, zero pages
//!   after filtering). Returned as `Err(Cb2PdfError)` from the top-level
//!   `convert*` functions. The batch controller catches these and moves on
//!   to the next archive.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (undecodable image,
//!   truncated entry) but the rest of the archive is fine. Stored as a
//!   [`crate::output::PageWarning`] on the archive's outcome so callers can
//!   inspect partial success rather than losing a whole book to one bad scan.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! page rejection, log and continue, or collect all warnings for a post-run
//! report. The pipeline itself always continues past page rejections.

use crate::output::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal, archive-level errors returned by the cb2pdf library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageWarning`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Cb2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Archive file was not found at the given path.
    #[error("Archive not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the archive.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is neither zip- nor rar-based.
    ///
    /// Kind detection sniffs content, never the file extension: a `.cbz`
    /// that is really a rar archive still converts, and a renamed text file
    /// fails here instead of deep inside a decoder.
    #[error("Unsupported archive: '{path}' is neither zip- nor rar-based\nFirst bytes: {magic:?}")]
    UnsupportedArchive { path: PathBuf, magic: [u8; 4] },

    /// The container format was recognised but the archive is structurally
    /// corrupt, or extraction failed partway through.
    #[error("Failed to extract '{path}': {detail}")]
    ExtractionFailed { path: PathBuf, detail: String },

    /// Rar-based archives need the external `unrar` binary, and none was found.
    #[error("The '{tool}' tool is required for rar-based archives but was not found.\n{hint}")]
    ToolUnavailable { tool: String, hint: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The archive opened fine but contained zero recognised page images.
    ///
    /// Distinct from [`Cb2PdfError::AssemblyFailed`]: this fires before any
    /// decoding is attempted, when filtering alone leaves nothing.
    #[error("No page images found in '{path}'\nThe archive may be empty or contain only non-image files.")]
    NoPagesFound { path: PathBuf },

    /// Every page was rejected during normalization, or the PDF could not
    /// be built from the surviving pages.
    #[error("Could not assemble PDF for '{path}': {detail}")]
    AssemblyFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or finalise the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Cb2PdfError {
    /// The pipeline phase this error belongs to, for structured failure
    /// records handed to the batch report.
    pub fn phase(&self) -> Phase {
        match self {
            Cb2PdfError::FileNotFound { .. }
            | Cb2PdfError::PermissionDenied { .. }
            | Cb2PdfError::UnsupportedArchive { .. } => Phase::Detect,
            Cb2PdfError::ExtractionFailed { .. } | Cb2PdfError::ToolUnavailable { .. } => {
                Phase::Extract
            }
            Cb2PdfError::NoPagesFound { .. } => Phase::Scan,
            Cb2PdfError::AssemblyFailed { .. } | Cb2PdfError::OutputWriteFailed { .. } => {
                Phase::Assemble
            }
            Cb2PdfError::InvalidConfig(_) | Cb2PdfError::Internal(_) => Phase::Setup,
        }
    }
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageWarning`] when a page is rejected.
/// The archive conversion continues unless ALL pages are rejected.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The entry could not be read out of the container (truncated entry,
    /// bad CRC, vanished workspace file).
    #[error("Page '{entry}': could not read entry: {detail}")]
    ReadFailed { entry: String, detail: String },

    /// The entry's bytes are not a decodable image.
    #[error("Page '{entry}': corrupt or undecodable image: {detail}")]
    CorruptImage { entry: String, detail: String },

    /// The decoded page could not be re-encoded to JPEG.
    #[error("Page '{entry}': JPEG encode failed: {detail}")]
    EncodeFailed { entry: String, detail: String },
}

impl PageError {
    /// Entry name of the page this error refers to.
    pub fn entry(&self) -> &str {
        match self {
            PageError::ReadFailed { entry, .. }
            | PageError::CorruptImage { entry, .. }
            | PageError::EncodeFailed { entry, .. } => entry,
        }
    }
}
