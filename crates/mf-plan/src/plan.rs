//! Per-file plan assembly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use mf_av::{sanitize_filename, Workspace};
use mf_core::config::TrackSelectionConfig;
use mf_core::{ConversionPolicy, Result, TrackKind, VideoMode};
use mf_probe::{MediaTrack, StreamCatalog, VideoStreamInfo};
use serde::Serialize;

use crate::build::{build_video, ContainerKind, VideoResult};
use crate::diagnostic::Diagnostic;
use crate::mux::{build_mux, MuxInput, MuxTrack};
use crate::naming::output_name;
use crate::operation::Operation;
use crate::resolve::{resolve, Resolution};
use crate::strategy::{select, DvTransform, RpuHandling, VideoStrategy};
use crate::tags::TagSet;
use crate::tracks::{select_tracks, ExternalTrack, TrackSelection};

/// Inputs for planning one file.
#[derive(Debug, Clone)]
pub struct PlanInput<'a> {
    pub catalog: &'a StreamCatalog,
    pub requested: &'a ConversionPolicy,
    pub audio_rules: &'a TrackSelectionConfig,
    pub subtitle_rules: &'a TrackSelectionConfig,
    pub external: &'a [ExternalTrack],
    pub workspace: &'a Workspace,
    /// Directory receiving the final file.
    pub output_dir: &'a Path,
}

/// Everything needed to turn one source into one output file.
#[derive(Debug, Clone, Serialize)]
pub struct FilePlan {
    pub source: PathBuf,
    /// Final destination.
    pub output: PathBuf,
    /// Where mkvmerge writes before the result is moved to `output`.
    pub staged_output: PathBuf,
    pub resolution: Resolution,
    pub strategy: VideoStrategy,
    pub video: VideoResult,
    pub tracks: Vec<MuxTrack>,
    /// Operations in execution order: track extraction, video chain, mux.
    pub operations: Vec<Operation>,
    /// Every intermediate file any operation reads, writes or stages.
    pub temp_files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FilePlan {
    /// Point the plan at a different final destination.
    pub fn retarget(&mut self, output: PathBuf) {
        self.output = output;
    }

    /// Tools the plan invokes, in first-use order.
    pub fn required_tools(&self) -> Vec<&str> {
        let mut tools: Vec<&str> = Vec::new();
        for op in &self.operations {
            if !tools.contains(&op.tool.as_str()) {
                tools.push(&op.tool);
            }
        }
        tools
    }

    /// Temp files referenced by any operation.
    pub fn referenced_temp_files(&self) -> BTreeSet<&Path> {
        let declared: BTreeSet<&Path> = self.temp_files.iter().map(PathBuf::as_path).collect();
        self.operations
            .iter()
            .flat_map(|op| op.files())
            .map(PathBuf::as_path)
            .filter(|p| declared.contains(p))
            .collect()
    }

    /// For each operation, the temp files that can be deleted once it has
    /// finished: files it reads that no later operation reads. Outputs
    /// nobody reads (the staged mux output) are never released here.
    pub fn release_points(&self) -> Vec<Vec<PathBuf>> {
        let mut released = vec![Vec::new(); self.operations.len()];
        for temp in &self.temp_files {
            if *temp == self.source || *temp == self.output || *temp == self.staged_output {
                continue;
            }
            let last_reader = self
                .operations
                .iter()
                .rposition(|op| op.inputs.contains(temp));
            if let Some(idx) = last_reader {
                released[idx].push(temp.clone());
            }
        }
        released
    }
}

/// Plan one file. Pure: nothing is read from or written to disk.
///
/// # Errors
///
/// Returns [`mf_core::Error::Planning`] when the chosen strategy cannot be
/// built (see [`build_video`]).
pub fn plan_file(input: &PlanInput<'_>) -> Result<FilePlan> {
    let catalog = input.catalog;
    let video = &catalog.video;
    let source = catalog.source.as_path();
    let ws = input.workspace;

    let resolution = resolve(input.requested, video);
    let (strategy, strategy_diags) = select(&resolution.policy, video);
    tracing::debug!("{}: strategy {strategy}", source.display());

    let mut diagnostics = resolution.diagnostics.clone();
    diagnostics.extend(strategy_diags);

    let audio = select_tracks(&catalog.audio, input.external, input.audio_rules, TrackKind::Audio);
    let subtitles = select_tracks(&catalog.subtitles, input.external, input.subtitle_rules, TrackKind::Subtitle);
    if audio.tracks.is_empty() && !input.external.iter().any(|e| e.kind == TrackKind::Audio) {
        diagnostics.push(Diagnostic::warn("No audio track selected; output will be silent"));
    }

    let mut operations = Vec::new();
    let mut temp_files = Vec::new();
    let mut tracks = Vec::new();

    for (kind, selection) in [(TrackKind::Audio, &audio), (TrackKind::Subtitle, &subtitles)] {
        diagnostics.extend(selection.diagnostics.iter().cloned());
        let (ops, temps, mux_tracks) = extract_tracks(kind, selection, input.external, source, ws);
        operations.extend(ops);
        temp_files.extend(temps);
        tracks.extend(mux_tracks);
    }

    let pipeline = build_video(&strategy, &resolution.policy, video, source, ws)?;
    diagnostics.extend(pipeline.diagnostics);
    operations.extend(pipeline.operations);
    temp_files.extend(pipeline.temp_files);

    let tags = global_tags(&resolution, &strategy, video);
    let tags_path = ws.temp_file("global_tags", "xml");
    temp_files.push(tags_path.clone());

    let staged_output = ws.temp_file("output", "mkv");
    temp_files.push(staged_output.clone());

    let frame_rate = match pipeline.result.kind {
        ContainerKind::RawElementary => video.frame_rate.as_deref(),
        ContainerKind::Container => None,
    };
    operations.push(build_mux(&MuxInput {
        video: &pipeline.result,
        frame_rate,
        tags: Some((tags_path.as_path(), tags.to_xml())),
        tracks: &tracks,
        output: &staged_output,
    }));

    let name = output_name(
        source,
        video,
        &resolution,
        strategy.keeps_dolby_vision(video),
    );
    let output = input.output_dir.join(name);

    Ok(FilePlan {
        source: source.to_path_buf(),
        output,
        staged_output,
        resolution,
        strategy,
        video: pipeline.result,
        tracks,
        operations,
        temp_files,
        diagnostics,
    })
}

/// Extraction operations for the selected internal tracks of one kind, plus
/// the mux entries for them and the matching external tracks.
fn extract_tracks(
    kind: TrackKind,
    selection: &TrackSelection,
    external: &[ExternalTrack],
    source: &Path,
    ws: &Workspace,
) -> (Vec<Operation>, Vec<PathBuf>, Vec<MuxTrack>) {
    let mut ops = Vec::new();
    let mut temps = Vec::new();
    let mut mux = Vec::new();

    for (pos, track) in selection.tracks.iter().enumerate() {
        let path = track_temp_path(kind, track, ws);
        ops.push(
            Operation::new(format!("extract-{kind}-{}", track.index), "mkvextract")
                .arg("tracks")
                .path_arg(source)
                .arg(format!("{}:{}", track.index, path.display()))
                .reads(source)
                .writes(&path),
        );
        temps.push(path.clone());
        mux.push(MuxTrack {
            kind,
            path,
            language: track.language.clone(),
            title: track
                .title
                .clone()
                .unwrap_or_else(|| format!("{} {}", track.language.to_uppercase(), track.codec_name)),
            default: selection.default_index == Some(pos),
        });
    }

    let offset = selection.tracks.len();
    for (i, ext) in external.iter().filter(|e| e.kind == kind).enumerate() {
        mux.push(MuxTrack {
            kind,
            path: ext.path.clone(),
            language: ext.language.clone(),
            title: ext.title.clone().unwrap_or_else(|| ext.language.to_uppercase()),
            default: selection.default_index == Some(offset + i),
        });
    }

    (ops, temps, mux)
}

fn track_temp_path(kind: TrackKind, track: &MediaTrack, ws: &Workspace) -> PathBuf {
    let lang = sanitize_filename(&track.language);
    match kind {
        TrackKind::Audio => ws.temp_file(&format!("audio_{lang}_{}", track.index), "mka"),
        TrackKind::Subtitle => {
            let ext = match track.codec_name.as_str() {
                "hdmv_pgs_subtitle" => "sup",
                "subrip" => "srt",
                _ => "mks",
            };
            ws.temp_file(&format!("sub_{lang}_{}", track.index), ext)
        }
    }
}

/// Informational tags describing what survived, plus static HDR10 tags for
/// encodes.
fn global_tags(resolution: &Resolution, strategy: &VideoStrategy, video: &VideoStreamInfo) -> TagSet {
    let mut tags = TagSet::new();

    if resolution.policy.video_mode == VideoMode::Encode {
        tags.push_hdr10(video);
    }

    let dv = if !video.has_dv() {
        "none".to_string()
    } else if !strategy.keeps_dolby_vision(video) {
        "removed".to_string()
    } else {
        match strategy {
            VideoStrategy::HybridPassthrough {
                dv: Some(DvTransform::ConvertToP8),
                ..
            }
            | VideoStrategy::UnifiedEncode {
                rpu: RpuHandling::ConvertAndReinject,
                ..
            } => "profile 8.1 (converted from profile 7)".to_string(),
            _ => match video.dv_profile() {
                Some(p) => format!("profile {p}"),
                None => "present".to_string(),
            },
        }
    };
    tags.push("DOLBY_VISION", dv);

    let hdr10plus = if !video.hdr10plus {
        "none"
    } else if strategy.keeps_hdr10plus(video) {
        "present"
    } else {
        "removed"
    };
    tags.push("HDR10_PLUS", hdr10plus);

    if resolution.safety_override {
        tags.push(
            "SAFETY_OVERRIDE",
            "Dolby Vision profile 5 kept as passthrough",
        );
    }

    tags
}
