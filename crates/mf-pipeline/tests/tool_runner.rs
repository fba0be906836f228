//! Runs whole plans through `ToolRunner` with shell scripts standing in for
//! the real tools.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use mf_av::{ToolRegistry, Workspace};
use mf_core::config::TrackSelectionConfig;
use mf_core::{ConversionPolicy, EncoderSettings, Error, TrackKind, VideoCodec};
use mf_pipeline::{PipelineExecutor, RunContext, RunOutcome, ToolRunner};
use mf_plan::{plan_file, FilePlan, PlanInput};
use mf_probe::{DvInfo, MediaTrack, StreamCatalog, VideoStreamInfo};
use tokio_util::sync::CancellationToken;

const TOOLS: &[&str] = &["mkvextract", "mkvmerge", "ffmpeg", "dovi_tool", "hdr10plus_tool"];

struct Harness {
    dir: tempfile::TempDir,
    plan: FilePlan,
    workspace: Workspace,
}

impl Harness {
    /// Profile 7 source encoded with NVENC: the longest chain.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Movie.2020.mkv");
        std::fs::write(&source, b"source").unwrap();

        let catalog = StreamCatalog {
            source: source.clone(),
            duration: Some(Duration::from_secs(5400)),
            video: VideoStreamInfo {
                index: 0,
                codec: VideoCodec::Hevc,
                codec_name: "hevc".into(),
                width: 3840,
                height: 2160,
                frame_rate: Some("24000/1001".into()),
                dolby_vision: Some(DvInfo {
                    profile: Some(7),
                    rpu_present: true,
                    el_present: true,
                    bl_present: true,
                }),
                hdr10plus: false,
                mastering_display: None,
                content_light: None,
            },
            audio: vec![MediaTrack {
                kind: TrackKind::Audio,
                index: 1,
                codec_name: "truehd".into(),
                language: "eng".into(),
                title: None,
                channels: Some(8),
                default: true,
                forced: false,
            }],
            subtitles: Vec::new(),
        };

        let workspace = Workspace::new(&source, &dir.path().join("work"));
        let requested = ConversionPolicy::encode(EncoderSettings::Nvenc {
            preset: "p7".into(),
            cq: 19,
        });
        let rules = TrackSelectionConfig::default();
        let plan = plan_file(&PlanInput {
            catalog: &catalog,
            requested: &requested,
            audio_rules: &rules,
            subtitle_rules: &rules,
            external: &[],
            workspace: &workspace,
            output_dir: &dir.path().join("out"),
        })
        .unwrap();

        Self { dir, plan, workspace }
    }

    fn bin(&self) -> PathBuf {
        let bin = self.dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        bin
    }

    fn log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    /// A script that logs its invocation and creates every missing work-dir
    /// path among its arguments (plain or `N:path`).
    fn writer_script(&self, name: &str) -> PathBuf {
        let body = format!(
            r#"#!/bin/sh
echo "{name}" >> "{log}"
for a in "$@"; do
  case "$a" in
    [0-9]*:/*) f="${{a#*:}}" ;;
    /*) f="$a" ;;
    *) continue ;;
  esac
  case "$f" in
    "{work}"/*) [ -e "$f" ] || printf data > "$f" ;;
  esac
done
"#,
            log = self.log().display(),
            work = self.workspace.work_dir().display(),
        );
        self.script(name, &body)
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.bin().join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn registry(&self, overrides: &[(&str, PathBuf)]) -> ToolRegistry {
        let mut tools = ToolRegistry::default();
        for name in TOOLS {
            tools.insert(name, self.writer_script(name), None);
        }
        for (name, path) in overrides {
            tools.insert(name, path.clone(), None);
        }
        tools
    }

    async fn run(&self, ctx: &RunContext) -> mf_core::Result<RunOutcome> {
        PipelineExecutor::new(&self.plan, &self.workspace).execute(ctx).await
    }
}

fn context(tools: ToolRegistry) -> RunContext {
    RunContext::new(Arc::new(ToolRunner::new(Arc::new(tools))))
}

fn leftovers(plan: &FilePlan) -> Vec<&Path> {
    plan.temp_files.iter().filter(|p| p.exists()).map(PathBuf::as_path).collect()
}

#[tokio::test]
async fn full_encode_chain_produces_output() {
    let h = Harness::new();
    let ctx = context(h.registry(&[]));

    let outcome = h.run(&ctx).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed(h.plan.output.clone()));
    assert!(h.plan.output.exists());
    assert!(leftovers(&h.plan).is_empty(), "left: {:?}", leftovers(&h.plan));

    let calls = std::fs::read_to_string(h.log()).unwrap();
    let calls: Vec<&str> = calls.lines().collect();
    assert_eq!(
        calls,
        vec![
            "mkvextract",
            "mkvextract",
            "dovi_tool",
            "ffmpeg",
            "dovi_tool",
            "dovi_tool",
            "mkvmerge"
        ]
    );
}

#[tokio::test]
async fn tool_failure_names_step_and_keeps_output_absent() {
    let h = Harness::new();
    let failing = h.script("dovi_fail", "#!/bin/sh\necho 'RPU parse error' >&2\nexit 3\n");
    let ctx = context(h.registry(&[("dovi_tool", failing)]));

    let err = h.run(&ctx).await.unwrap_err();

    assert_matches!(&err, Error::Operation { step, tool, message } => {
        assert_eq!(step, "extract-rpu");
        assert_eq!(tool, "dovi_tool");
        assert!(message.contains("RPU parse error"), "message: {message}");
    });
    assert!(!h.plan.output.exists());
    // Default policy is on_success: the failed run's temps stay for inspection.
    assert!(!leftovers(&h.plan).is_empty());
}

#[tokio::test]
async fn cancellation_kills_the_running_tool() {
    let h = Harness::new();
    let slow = h.script("slow_ffmpeg", "#!/bin/sh\nexec sleep 30\n");
    let token = CancellationToken::new();
    let ctx = context(h.registry(&[("ffmpeg", slow)])).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = h.run(&ctx).await.unwrap_err();
    canceller.await.unwrap();

    assert_matches!(err, Error::Cancelled(step) if step == "encode");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!h.plan.output.exists());
}
