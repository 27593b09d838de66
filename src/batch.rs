//! Batch controller: converts many archives with bounded parallelism.
//!
//! Each archive runs on its own `spawn_blocking` thread; at most
//! `config.jobs` archives are in flight at once. One archive failing never
//! aborts the batch — it becomes a [`FailureRecord`] in the report and the
//! remaining archives proceed.

use crate::config::ConversionConfig;
use crate::convert::{convert_blocking, output_target};
use crate::error::Cb2PdfError;
use crate::output::{ArchiveOutcome, BatchReport, FailureRecord};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Convert a set of archives, up to `config.jobs` concurrently.
///
/// Outcomes in the returned report are in the same order as `archives`,
/// regardless of completion order.
pub async fn convert_batch(archives: &[PathBuf], config: &ConversionConfig) -> BatchReport {
    let start = Instant::now();
    info!(archives = archives.len(), jobs = config.jobs, "starting batch");
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(archives.len());
    }

    let mut outcomes: Vec<(usize, ArchiveOutcome)> = stream::iter(
        archives
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, archive)| {
                let config = config.clone();
                async move {
                    let outcome = convert_one(archive, &config).await;
                    (index, outcome)
                }
            }),
    )
    .buffer_unordered(config.jobs)
    .collect()
    .await;
    outcomes.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<ArchiveOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    let completed = outcomes.iter().filter(|o| o.is_completed()).count();
    info!(
        completed,
        failed = outcomes.len() - completed,
        ms = start.elapsed().as_millis() as u64,
        "batch complete"
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(outcomes.len(), completed);
    }

    BatchReport {
        outcomes,
        total_duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn convert_one(archive: PathBuf, config: &ConversionConfig) -> ArchiveOutcome {
    let target = output_target(&archive, config);
    let result = {
        let archive = archive.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || convert_blocking(&archive, &target, &config))
            .await
            .map_err(|e| Cb2PdfError::Internal(format!("conversion task panicked: {e}")))
            .and_then(|r| r)
    };
    match result {
        Ok(output) => ArchiveOutcome::Completed(output),
        Err(err) => {
            error!(archive = %archive.display(), %err, "archive failed");
            if let Some(ref cb) = config.progress_callback {
                cb.on_archive_failed(&archive, &err.to_string());
            }
            ArchiveOutcome::Failed(FailureRecord {
                archive,
                phase: err.phase(),
                reason: err.to_string(),
            })
        }
    }
}
