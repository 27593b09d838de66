//! Result types produced by the conversion pipeline.
//!
//! Archive-level success does not imply zero page-level problems, so a
//! completed [`ConversionOutput`] always carries the list of
//! [`PageWarning`]s accumulated while normalizing. Failures become
//! [`FailureRecord`]s — (archive, phase, reason) triples that stay
//! serialisable so batch runs can be logged or emitted as JSON.

use crate::error::PageError;
use crate::pipeline::archive::ArchiveKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline phase in which an archive-level failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Configuration or other pre-pipeline failure.
    Setup,
    /// Archive kind detection (magic-byte sniffing).
    Detect,
    /// Container extraction / entry reading.
    Extract,
    /// Page filtering and ordering.
    Scan,
    /// Per-page decode/normalize. Reserved: page failures surface as
    /// [`PageWarning`]s rather than failure records, so no archive-level
    /// error currently maps here, but external log consumers keep one
    /// phase vocabulary across both.
    Normalize,
    /// PDF packing and output finalisation.
    Assemble,
}

/// A rejected page, attached to an otherwise-successful archive outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageWarning {
    /// Entry name inside the archive.
    pub entry: String,
    /// Ordinal the page held in the scan order before rejection.
    pub ordinal: usize,
    /// What went wrong.
    pub error: PageError,
}

/// Timing and size statistics for one archive conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Raw entries found in the container (before filtering).
    pub total_entries: usize,
    /// Entries recognised as page images by the scanner.
    pub scanned_pages: usize,
    /// Pages that survived normalization and made it into the PDF.
    pub assembled_pages: usize,
    /// Pages rejected during normalization.
    pub rejected_pages: usize,
    /// Pages that had to be downscaled to the dimension cap.
    pub downscaled_pages: usize,
    /// Size of the finished PDF in bytes.
    pub output_bytes: u64,
    pub extract_duration_ms: u64,
    pub normalize_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The outcome of converting one archive that produced a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Source archive path.
    pub archive: PathBuf,
    /// Detected container kind.
    pub kind: ArchiveKind,
    /// Path of the finished PDF.
    pub output: PathBuf,
    /// Number of pages in the finished PDF.
    pub page_count: usize,
    /// Per-page rejections. Non-empty warnings still mean a usable document.
    pub warnings: Vec<PageWarning>,
    pub stats: ConversionStats,
}

/// Structured record of an archive-level failure, handed to the logging
/// collaborator and embedded in batch reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub archive: PathBuf,
    pub phase: Phase,
    pub reason: String,
}

/// Exactly one of these exists per input archive after a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    Completed(ConversionOutput),
    Failed(FailureRecord),
}

impl ArchiveOutcome {
    /// Source archive path, regardless of outcome.
    pub fn archive(&self) -> &PathBuf {
        match self {
            ArchiveOutcome::Completed(out) => &out.archive,
            ArchiveOutcome::Failed(rec) => &rec.archive,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ArchiveOutcome::Completed(_))
    }
}

/// Tally of a whole batch run: one outcome per input archive, input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<ArchiveOutcome>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    /// Number of archives that produced a document.
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    /// Number of archives that failed outright.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }

    /// All successful conversion outputs, in input order.
    pub fn outputs(&self) -> impl Iterator<Item = &ConversionOutput> {
        self.outcomes.iter().filter_map(|o| match o {
            ArchiveOutcome::Completed(out) => Some(out),
            ArchiveOutcome::Failed(_) => None,
        })
    }

    /// All failure records, for the error-log collaborator.
    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.outcomes.iter().filter_map(|o| match o {
            ArchiveOutcome::Failed(rec) => Some(rec),
            ArchiveOutcome::Completed(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(name: &str) -> ArchiveOutcome {
        ArchiveOutcome::Completed(ConversionOutput {
            archive: PathBuf::from(name),
            kind: ArchiveKind::Zip,
            output: PathBuf::from(format!("{name}.pdf")),
            page_count: 3,
            warnings: vec![],
            stats: ConversionStats::default(),
        })
    }

    fn failed(name: &str) -> ArchiveOutcome {
        ArchiveOutcome::Failed(FailureRecord {
            archive: PathBuf::from(name),
            phase: Phase::Extract,
            reason: "corrupt central directory".into(),
        })
    }

    #[test]
    fn batch_report_counts() {
        let report = BatchReport {
            outcomes: vec![completed("a.cbz"), failed("b.cbz"), completed("c.cbz")],
            total_duration_ms: 0,
        };
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(
            report.failures().next().unwrap().archive,
            PathBuf::from("b.cbz")
        );
    }

    #[test]
    fn outcomes_round_trip_as_json() {
        let report = BatchReport {
            outcomes: vec![completed("a.cbz"), failed("b.cbr")],
            total_duration_ms: 12,
        };
        let json = serde_json::to_string(&report).expect("serialise");
        assert!(json.contains("\"status\":\"completed\""));
        assert!(json.contains("\"status\":\"failed\""));
        let back: BatchReport = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.completed(), 1);
        assert_eq!(back.failed(), 1);
    }
}
