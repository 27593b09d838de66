//! # cb2pdf
//!
//! Convert comic book archives (CBZ/CBR) into per-archive PDF documents.
//!
//! ## Why this crate?
//!
//! Comic archives are just zip or rar containers full of page images, but
//! turning them into readable PDFs has sharp edges: entries sorted
//! lexicographically put `page10` before `page2`, scanner output is often
//! far larger than any screen needs, and one corrupt page should not cost
//! you the other three hundred. This crate handles ordering, bounded
//! downscaling, and per-page fault isolation, and packs the resulting JPEGs
//! into the PDF byte-for-byte — no second lossy recompression.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CBZ / CBR
//!  │
//!  ├─ 1. Detect     archive kind by magic bytes, not file extension
//!  ├─ 2. Extract    zip entries read lazily; rar via the external unrar tool
//!  ├─ 3. Scan       filter junk, natural-sort into reading order
//!  ├─ 4. Normalize  decode, flatten alpha, Lanczos downscale, JPEG q90
//!  ├─ 5. Assemble   one PDF page per image, pixel dims = point dims
//!  └─ 6. Finalise   atomic write: temp file + rename
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cb2pdf::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("Saga Vol 1.cbz", &config).await?;
//!     println!("{} pages -> {}", output.page_count, output.output.display());
//!     for warning in &output.warnings {
//!         eprintln!("skipped {}: {}", warning.entry, warning.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cb2pdf` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! cb2pdf = { version = "0.3", default-features = false }
//! ```
//!
//! ## CBR support
//!
//! Rar extraction shells out to the `unrar` binary. It is resolved from, in
//! order: [`ConversionConfig::unrar_path`], the `CB2PDF_UNRAR` environment
//! variable, then `PATH`. Zip-based archives need no external tool.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::convert_batch;
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, inspect};
pub use error::{Cb2PdfError, PageError};
pub use output::{
    ArchiveOutcome, BatchReport, ConversionOutput, ConversionStats, FailureRecord, PageWarning,
    Phase,
};
pub use pipeline::archive::{detect_kind, rar_support, ArchiveInfo, ArchiveKind};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
