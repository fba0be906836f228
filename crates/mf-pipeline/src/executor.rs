//! Plan execution.
//!
//! [`PipelineExecutor`] runs the operations of one [`FilePlan`] strictly in
//! order and stops at the first failure. Cancellation is checked before each
//! operation and raced against the running one, so a long encode stops
//! promptly. Temps are released as soon as their last reader finishes (when
//! auto-cleanup is on) and whatever is left goes through the final cleanup
//! policy, on success and on failure alike.

use std::path::PathBuf;

use mf_av::Workspace;
use mf_core::{Error, Result};
use mf_plan::{FilePlan, Operation};

use crate::cleanup;
use crate::context::RunContext;

/// How a single file run ended, short of an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The output was written to this path.
    Completed(PathBuf),
    /// The output already existed; nothing ran.
    Skipped(PathBuf),
    /// Commands were logged, nothing ran.
    DryRun,
}

/// Executes one plan.
#[derive(Debug)]
pub struct PipelineExecutor<'a> {
    plan: &'a FilePlan,
    workspace: &'a Workspace,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(plan: &'a FilePlan, workspace: &'a Workspace) -> Self {
        Self { plan, workspace }
    }

    /// Run the plan.
    ///
    /// # Errors
    ///
    /// - [`Error::Operation`] naming the step and tool that failed.
    /// - [`Error::Cancelled`] naming the step that was running or about to run.
    /// - [`Error::Filesystem`] if the work dir cannot be created, a staged file
    ///   cannot be written, or the output cannot be moved into place.
    pub async fn execute(&self, ctx: &RunContext) -> Result<RunOutcome> {
        let plan = self.plan;
        tracing::info!("{} -> {} ({})", plan.source.display(), plan.output.display(), plan.strategy);
        for diagnostic in &plan.diagnostics {
            diagnostic.log();
        }

        if plan.output.exists() {
            tracing::warn!("Output already exists, skipping: {}", plan.output.display());
            return Ok(RunOutcome::Skipped(plan.output.clone()));
        }

        if ctx.dry_run {
            self.log_dry_run();
            return Ok(RunOutcome::DryRun);
        }

        self.workspace.prepare()?;
        if let Some(dir) = plan.output.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::filesystem(dir, format!("failed to create output dir: {e}")))?;
        }

        let result = match self.run_operations(ctx).await {
            Ok(()) => self.workspace.finalize(&plan.staged_output, &plan.output),
            Err(e) => Err(e),
        };

        cleanup::final_pass(&ctx.cleanup, result.is_ok(), ctx.prompt.as_ref(), &plan.temp_files).await;

        match result {
            Ok(path) => {
                tracing::info!("Finished: {}", path.display());
                Ok(RunOutcome::Completed(path))
            }
            Err(e) => {
                tracing::error!("{}: {e}", plan.source.display());
                Err(e)
            }
        }
    }

    async fn run_operations(&self, ctx: &RunContext) -> Result<()> {
        let ops = &self.plan.operations;
        let releases = if ctx.cleanup.auto_cleanup {
            self.plan.release_points()
        } else {
            vec![Vec::new(); ops.len()]
        };
        let total = ops.len().max(1) as f32;

        for (idx, op) in ops.iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                tracing::info!("Cancelled before {}", op.step);
                return Err(Error::Cancelled(op.step.clone()));
            }

            write_staged(op).await?;
            tracing::info!("Starting: {} ({})", op.step, op.tool);
            tracing::debug!("{}", op.command_line());

            let result = tokio::select! {
                biased;
                () = ctx.cancellation.cancelled() => {
                    tracing::info!("Cancelled during {}", op.step);
                    Err(Error::Cancelled(op.step.clone()))
                }
                r = ctx.runner.run(op) => r.map_err(|e| attribute(op, e)),
            };
            result?;

            let pct = (idx + 1) as f32 / total * 100.0;
            ctx.progress.send(pct, &op.step);
            tracing::info!("[{pct:.0}%] Completed: {}", op.step);

            if let Some(done) = releases.get(idx).filter(|files| !files.is_empty()) {
                let removed = cleanup::remove_files(done).await;
                tracing::debug!("Released {removed} temp file(s) after {}", op.step);
            }
        }
        Ok(())
    }

    fn log_dry_run(&self) {
        for op in &self.plan.operations {
            for staged in &op.staged {
                tracing::info!("[dry run] would write {}", staged.path.display());
            }
            tracing::info!("[dry run] {}: {}", op.step, op.command_line());
        }
        tracing::info!("[dry run] would move result to {}", self.plan.output.display());
    }
}

async fn write_staged(op: &Operation) -> Result<()> {
    for staged in &op.staged {
        tokio::fs::write(&staged.path, &staged.contents)
            .await
            .map_err(|e| Error::filesystem(&staged.path, format!("failed to write: {e}")))?;
    }
    Ok(())
}

/// Tag a runner error with the step that produced it.
fn attribute(op: &Operation, err: Error) -> Error {
    match err {
        Error::Operation { .. } | Error::Cancelled(_) => err,
        other => Error::operation(&op.step, &op.tool, other.to_string()),
    }
}
