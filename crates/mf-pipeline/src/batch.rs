//! Sequential multi-file runs.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::executor::RunOutcome;

/// Per-batch tally. Dry runs count as succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Source and error message of every failure, in processing order.
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn record(&mut self, source: &Path, result: &mf_core::Result<RunOutcome>) {
        match result {
            Ok(RunOutcome::Completed(_) | RunOutcome::DryRun) => self.succeeded += 1,
            Ok(RunOutcome::Skipped(_)) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                self.failures.push((source.to_path_buf(), e.to_string()));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s): {} succeeded, {} skipped, {} failed",
            self.total(),
            self.succeeded,
            self.skipped,
            self.failed
        )
    }
}

/// Process `sources` one at a time. A failure is recorded and the batch
/// moves on; cancellation stops it before the next file.
pub async fn run_batch<F, Fut>(sources: &[PathBuf], cancellation: &CancellationToken, mut process: F) -> BatchSummary
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = mf_core::Result<RunOutcome>>,
{
    let mut summary = BatchSummary::default();
    let total = sources.len();

    for (idx, source) in sources.iter().enumerate() {
        if cancellation.is_cancelled() {
            tracing::warn!("Batch cancelled; {} file(s) not processed", total - idx);
            break;
        }
        tracing::info!("[{}/{total}] {}", idx + 1, source.display());

        let result = process(source.clone()).await;
        if let Err(e) = &result {
            tracing::error!("Failed: {}: {e}", source.display());
        }
        summary.record(source, &result);
    }

    tracing::info!("Batch complete: {summary}");
    for (source, message) in &summary.failures {
        tracing::info!("  {}: {message}", source.display());
    }
    summary
}
