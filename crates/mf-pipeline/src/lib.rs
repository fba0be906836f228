//! # mf-pipeline
//!
//! Runs a [`FilePlan`](mf_plan::FilePlan) against the real tools.
//!
//! This crate provides:
//!
//! - **[`OperationRunner`]** trait -- the seam between planned operations and
//!   process execution, with [`ToolRunner`] as the real implementation.
//! - **[`RunContext`]** -- runner, workspace, cancellation, progress and
//!   cleanup settings for one run.
//! - **[`PipelineExecutor`]** -- strict in-order, fail-fast execution with
//!   per-file temp release and a final cleanup pass.
//! - **[`BatchSummary`]** / **[`run_batch`]** -- sequential multi-file runs.

pub mod batch;
pub mod cleanup;
pub mod context;
pub mod executor;
pub mod runner;

pub use batch::{run_batch, BatchSummary};
pub use cleanup::{CleanupPrompt, CleanupSettings, KeepFiles};
pub use context::{ProgressSender, RunContext};
pub use executor::{PipelineExecutor, RunOutcome};
pub use runner::{OperationRunner, ToolRunner};
