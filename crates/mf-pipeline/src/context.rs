//! Execution context shared by every operation in a run.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cleanup::{CleanupPrompt, CleanupSettings, KeepFiles};
use crate::runner::OperationRunner;

/// Sender for reporting progress while a plan runs.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and
/// the step name that just finished.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// A sender that discards all reports.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Settings and services for running plans. One context can drive many
/// files; it holds nothing file-specific.
pub struct RunContext {
    pub runner: Arc<dyn OperationRunner>,
    /// Log each command line instead of running it.
    pub dry_run: bool,
    /// Checked before every operation and raced against the running one.
    pub cancellation: CancellationToken,
    pub progress: Arc<ProgressSender>,
    pub cleanup: CleanupSettings,
    /// Consulted by the final cleanup pass under the `ask` policy.
    pub prompt: Arc<dyn CleanupPrompt>,
}

impl RunContext {
    pub fn new(runner: Arc<dyn OperationRunner>) -> Self {
        Self {
            runner,
            dry_run: false,
            cancellation: CancellationToken::new(),
            progress: Arc::new(ProgressSender::noop()),
            cleanup: CleanupSettings::default(),
            prompt: Arc::new(KeepFiles),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupSettings) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn CleanupPrompt>) -> Self {
        self.prompt = prompt;
        self
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("dry_run", &self.dry_run)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}
