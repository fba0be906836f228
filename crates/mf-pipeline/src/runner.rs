//! Operation runners.

use std::sync::Arc;

use async_trait::async_trait;
use mf_av::ToolRegistry;
use mf_plan::Operation;

/// Executes one planned [`Operation`].
///
/// Implementations must be cancel-safe: dropping the returned future stops
/// whatever the operation started.
#[async_trait]
pub trait OperationRunner: Send + Sync {
    async fn run(&self, op: &Operation) -> mf_core::Result<()>;
}

/// Runs operations as child processes resolved through a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ToolRunner {
    tools: Arc<ToolRegistry>,
}

impl ToolRunner {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl OperationRunner for ToolRunner {
    async fn run(&self, op: &Operation) -> mf_core::Result<()> {
        let mut cmd = self.tools.command(&op.tool)?;
        cmd.args(op.args.iter().cloned());
        tracing::debug!("Running: {}", cmd.display());
        cmd.execute().await?;
        Ok(())
    }
}
