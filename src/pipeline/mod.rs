//! Pipeline stages for archive-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different container backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! archive ──▶ scan ──▶ normalize ──▶ assemble
//! (zip/rar)  (filter   (decode,      (DCTDecode
//!  entries    + natural  flatten,      XObjects,
//!  lazily)    order)     Lanczos,      atomic
//!                        JPEG)         rename)
//! ```
//!
//! 1. [`archive`] — sniff the container kind, yield entry names and bytes
//!    without materialising the whole archive; rar extraction uses a scoped
//!    temp workspace released on every exit path
//! 2. [`scan`] — drop junk paths and non-images, order what remains
//!    naturally so `page_10` follows `page_2`
//! 3. [`normalize`] — per-page decode, white-background alpha flattening,
//!    Lanczos downscale above the dimension cap, JPEG re-encode; one decoded
//!    page in memory at a time, rejections never abort the archive
//! 4. [`assemble`] — pack the finished JPEG streams into a PDF without
//!    re-encoding, finalised atomically via temp-file + rename

pub mod archive;
pub mod assemble;
pub mod normalize;
pub mod scan;
