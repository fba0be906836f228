//! Per-file processing: probe, plan, resolve the output name, execute.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mf_av::{FfprobeProber, ToolRegistry, Workspace};
use mf_core::config::Config;
use mf_core::{ConversionPolicy, EncoderKind, VideoMode};
use mf_pipeline::{PipelineExecutor, RunContext, RunOutcome};
use mf_plan::{plan_file, resolve_collision, ExternalTrack, FilePlan, OutputTarget, PlanInput};
use mf_probe::Prober;

/// A plan together with the workspace its temp names came from.
#[derive(Debug)]
pub struct PlannedFile {
    pub plan: FilePlan,
    pub workspace: Workspace,
}

/// Shared state for processing any number of files with one configuration.
pub struct Engine {
    config: Config,
    tools: Arc<ToolRegistry>,
    prober: Arc<dyn Prober>,
    requested: ConversionPolicy,
    external: Vec<ExternalTrack>,
    output_dir: Option<PathBuf>,
}

impl Engine {
    /// Discover tools and fix the requested policy.
    ///
    /// `output_dir` overrides `output.directory` from the config. External
    /// track files must exist; a missing one fails here, before any tool runs.
    pub fn new(config: Config, output_dir: Option<PathBuf>, external: Vec<ExternalTrack>) -> mf_core::Result<Self> {
        if let Some(track) = external.iter().find(|t| !t.path.is_file()) {
            return Err(mf_core::Error::filesystem(&track.path, "external track file does not exist"));
        }

        let tools = ToolRegistry::discover(&config.tools);
        let prober = FfprobeProber::new(tools.require("ffprobe")?.path.clone());

        let detected = if config.video.mode == VideoMode::Encode {
            let found = tools.detect_encoders();
            tracing::debug!("Hardware encoders: {found:?}");
            found.first().copied()
        } else {
            None
        };
        let requested = config.video.requested_policy(detected);
        if requested.video_mode == VideoMode::Encode && requested.encoder.is_none() {
            tracing::warn!("Encode requested but no hardware HEVC encoder was found");
        }

        Ok(Self {
            output_dir: output_dir.or_else(|| config.output.directory.clone()),
            config,
            tools: Arc::new(tools),
            prober: Arc::new(prober),
            requested,
            external,
        })
    }

    pub fn tools(&self) -> Arc<ToolRegistry> {
        self.tools.clone()
    }

    /// Encoder chosen for this run, if encoding.
    pub fn encoder(&self) -> Option<EncoderKind> {
        self.requested.encoder.as_ref().map(|e| e.kind())
    }

    /// Probe `source` and plan it. Nothing is written.
    pub async fn plan(&self, source: &Path) -> mf_core::Result<PlannedFile> {
        if !source.is_file() {
            return Err(mf_core::Error::filesystem(source, "source file does not exist"));
        }
        let catalog = self.prober.probe(source).await?;

        let output_dir = self
            .output_dir
            .clone()
            .or_else(|| source.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let work_dir = self.config.output.work_dir.clone().unwrap_or_else(|| output_dir.clone());
        let workspace = Workspace::new(source, &work_dir);

        let mut plan = plan_file(&PlanInput {
            catalog: &catalog,
            requested: &self.requested,
            audio_rules: &self.config.audio,
            subtitle_rules: &self.config.subtitles,
            external: &self.external,
            workspace: &workspace,
            output_dir: &output_dir,
        })?;

        let name = plan
            .output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match resolve_collision(&output_dir, &name, self.config.output.on_collision, Path::exists) {
            OutputTarget::Fresh(path) => plan.retarget(path),
            OutputTarget::Exists(path) => tracing::debug!("{} exists; run will be skipped", path.display()),
        }

        Ok(PlannedFile { plan, workspace })
    }

    /// Plan and execute one file.
    pub async fn process(&self, source: &Path, ctx: &RunContext) -> mf_core::Result<RunOutcome> {
        let PlannedFile { plan, workspace } = self.plan(source).await?;

        if !ctx.dry_run {
            let missing = self.tools.missing(plan.required_tools());
            if !missing.is_empty() {
                return Err(mf_core::Error::tool(
                    missing.join(", "),
                    format!("required for the {} strategy but not found", plan.strategy.name()),
                ));
            }
        }

        PipelineExecutor::new(&plan, &workspace).execute(ctx).await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("requested", &self.requested)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
