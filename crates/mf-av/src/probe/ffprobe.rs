//! FFprobe-based [`mf_probe::Prober`] implementation.
//!
//! Runs two passes: `-show_format -show_streams` for the stream layout and
//! Dolby Vision configuration, then a single-frame `-show_frames` pass on the
//! main video stream for static HDR10 metadata and HDR10+ side data, which
//! most containers only expose per frame.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use mf_core::{TrackKind, VideoCodec};
use mf_probe::types::parse_rational;
use mf_probe::{
    ContentLightLevel, DvInfo, MasteringDisplay, MediaTrack, Prober, StreamCatalog,
    VideoStreamInfo,
};
use serde::Deserialize;
use serde_json::Value;

use crate::command::ToolCommand;

const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

const SD_DOVI_CONFIG: &str = "DOVI configuration record";
const SD_MASTERING: &str = "Mastering display metadata";
const SD_CONTENT_LIGHT: &str = "Content light level metadata";
const SD_HDR10PLUS: &str = "HDR Dynamic Metadata SMPTE2094-40 (HDR10+)";
const SD_DOVI_RPU: &str = "Dolby Vision RPU Data";

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    async fn run_json(&self, args: &[&str], path: &Path) -> mf_core::Result<String> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "quiet", "-print_format", "json"])
            .args(args.iter().copied())
            .arg(path.to_string_lossy().as_ref())
            .timeout(PROBE_TIMEOUT);
        Ok(cmd.execute().await?.stdout)
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> mf_core::Result<StreamCatalog> {
        let streams_json = self
            .run_json(&["-show_format", "-show_streams"], path)
            .await?;
        let mut catalog = catalog_from_json(path, &streams_json)?;

        let frame_json = self
            .run_json(
                &[
                    "-show_frames",
                    "-select_streams",
                    "v:0",
                    "-read_intervals",
                    "%+#1",
                ],
                path,
            )
            .await;

        match frame_json {
            Ok(json) => {
                if let Err(e) = apply_frame_json(&mut catalog.video, &json) {
                    tracing::warn!("Frame-level probe output unusable: {e}");
                }
            }
            Err(e) => tracing::warn!("Frame-level probe failed: {e}"),
        }

        log_summary(&catalog.video);
        Ok(catalog)
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some()
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    default: u8,
    #[serde(default)]
    forced: u8,
    #[serde(default)]
    attached_pic: u8,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    dv_profile: Option<u8>,
    rpu_present_flag: Option<u8>,
    el_present_flag: Option<u8>,
    bl_present_flag: Option<u8>,
    red_x: Option<Value>,
    red_y: Option<Value>,
    green_x: Option<Value>,
    green_y: Option<Value>,
    blue_x: Option<Value>,
    blue_y: Option<Value>,
    white_point_x: Option<Value>,
    white_point_y: Option<Value>,
    min_luminance: Option<Value>,
    max_luminance: Option<Value>,
    max_content: Option<Value>,
    max_average: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFrames {
    #[serde(default)]
    frames: Vec<FfprobeFrame>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFrame {
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Build a catalog from `-show_format -show_streams` JSON.
pub fn catalog_from_json(path: &Path, json: &str) -> mf_core::Result<StreamCatalog> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| mf_core::Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let duration = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64);

    let mut video: Option<VideoStreamInfo> = None;
    let mut audio = Vec::new();
    let mut subtitles = Vec::new();

    for stream in output.streams {
        let codec_type = stream.codec_type.clone().unwrap_or_default();
        match codec_type.as_str() {
            "video" => {
                let codec_name = stream.codec_name.clone().unwrap_or_default();
                if stream.disposition.attached_pic == 1 {
                    tracing::info!(
                        "Ignoring attached picture (index {}, {codec_name})",
                        stream.index
                    );
                    continue;
                }
                if video.is_none() {
                    video = Some(video_from_stream(stream));
                    continue;
                }
                let main_profile = video.as_ref().and_then(|v| v.dv_profile());
                let codec = VideoCodec::from_codec_name(&codec_name);
                if codec.is_hevc() && main_profile == Some(7) {
                    tracing::warn!(
                        "Second HEVC stream (index {}) looks like a Dolby Vision enhancement layer; it will be ignored",
                        stream.index
                    );
                } else {
                    tracing::warn!(
                        "Unexpected second video stream (index {}, {codec_name}) will be ignored",
                        stream.index
                    );
                }
            }
            "audio" => audio.push(track_from_stream(TrackKind::Audio, stream)),
            "subtitle" => subtitles.push(track_from_stream(TrackKind::Subtitle, stream)),
            _ => {}
        }
    }

    let video = video.ok_or_else(|| {
        mf_core::Error::Probe(format!("no video stream found in {}", path.display()))
    })?;

    Ok(StreamCatalog {
        source: path.to_path_buf(),
        duration,
        video,
        audio,
        subtitles,
    })
}

/// Merge single-frame `-show_frames` JSON into the main video stream.
///
/// Stream-level static HDR10 values win over frame-level ones.
pub fn apply_frame_json(video: &mut VideoStreamInfo, json: &str) -> mf_core::Result<()> {
    let frames: FfprobeFrames = serde_json::from_str(json)
        .map_err(|e| mf_core::Error::Probe(format!("ffprobe frame JSON parse error: {e}")))?;

    let Some(frame) = frames.frames.first() else {
        return Ok(());
    };

    for sd in &frame.side_data_list {
        match sd.side_data_type.as_deref() {
            Some(SD_MASTERING) if video.mastering_display.is_none() => {
                video.mastering_display = mastering_display(sd);
            }
            Some(SD_CONTENT_LIGHT) if video.content_light.is_none() => {
                video.content_light = content_light(sd);
            }
            Some(SD_HDR10PLUS) => video.hdr10plus = true,
            Some(SD_DOVI_RPU) if video.dolby_vision.is_none() => {
                video.dolby_vision = Some(DvInfo {
                    profile: None,
                    rpu_present: true,
                    el_present: false,
                    bl_present: true,
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// Some muxers report `r_frame_rate` as `0/0`; only positive rates count.
fn usable_rate(rate: Option<String>) -> Option<String> {
    rate.filter(|r| parse_rational(r).is_some_and(|f| f > 0.0))
}

fn video_from_stream(stream: FfprobeStream) -> VideoStreamInfo {
    let codec_name = stream.codec_name.unwrap_or_default();
    let mut info = VideoStreamInfo {
        index: stream.index,
        codec: VideoCodec::from_codec_name(&codec_name),
        codec_name,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        frame_rate: usable_rate(stream.r_frame_rate).or_else(|| usable_rate(stream.avg_frame_rate)),
        dolby_vision: None,
        hdr10plus: false,
        mastering_display: None,
        content_light: None,
    };

    for sd in &stream.side_data_list {
        match sd.side_data_type.as_deref() {
            Some(SD_DOVI_CONFIG) => {
                info.dolby_vision = Some(DvInfo {
                    profile: sd.dv_profile,
                    rpu_present: sd.rpu_present_flag == Some(1),
                    el_present: sd.el_present_flag == Some(1),
                    bl_present: sd.bl_present_flag == Some(1),
                });
            }
            Some(SD_MASTERING) => info.mastering_display = mastering_display(sd),
            Some(SD_CONTENT_LIGHT) => info.content_light = content_light(sd),
            Some(SD_HDR10PLUS) => info.hdr10plus = true,
            _ => {}
        }
    }

    if info.dolby_vision.is_none()
        && stream
            .tags
            .comment
            .as_deref()
            .is_some_and(|c| c.contains("Dolby Vision"))
    {
        info.dolby_vision = Some(DvInfo {
            profile: None,
            rpu_present: true,
            el_present: false,
            bl_present: true,
        });
    }

    info
}

fn track_from_stream(kind: TrackKind, stream: FfprobeStream) -> MediaTrack {
    MediaTrack {
        kind,
        index: stream.index,
        codec_name: stream.codec_name.unwrap_or_else(|| "unknown".into()),
        language: stream
            .tags
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "und".into()),
        title: stream.tags.title.filter(|t| !t.trim().is_empty()),
        channels: stream.channels,
        default: stream.disposition.default == 1,
        forced: stream.disposition.forced == 1,
    }
}

fn number(v: &Option<Value>) -> Option<f64> {
    match v.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_rational(s),
        _ => None,
    }
}

fn mastering_display(sd: &FfprobeSideData) -> Option<MasteringDisplay> {
    let parsed = (|| {
        Some(MasteringDisplay {
            red: (number(&sd.red_x)?, number(&sd.red_y)?),
            green: (number(&sd.green_x)?, number(&sd.green_y)?),
            blue: (number(&sd.blue_x)?, number(&sd.blue_y)?),
            white_point: (number(&sd.white_point_x)?, number(&sd.white_point_y)?),
            max_luminance: number(&sd.max_luminance)?,
            min_luminance: number(&sd.min_luminance)?,
        })
    })();
    if parsed.is_none() {
        tracing::warn!("Could not parse mastering display metadata");
    }
    parsed
}

fn content_light(sd: &FfprobeSideData) -> Option<ContentLightLevel> {
    let max_cll = number(&sd.max_content).unwrap_or(0.0) as u32;
    let max_fall = number(&sd.max_average).unwrap_or(0.0) as u32;
    if max_cll == 0 && max_fall == 0 {
        tracing::warn!("Content light level metadata is 0,0; ignoring it");
        return None;
    }
    Some(ContentLightLevel { max_cll, max_fall })
}

fn log_summary(video: &VideoStreamInfo) {
    if let Some(ref dv) = video.dolby_vision {
        match dv.profile {
            Some(p) => tracing::info!("Dolby Vision detected (profile {p})"),
            None => tracing::info!("Dolby Vision detected (profile unknown)"),
        }
    }
    if video.hdr10plus {
        tracing::info!("HDR10+ dynamic metadata detected");
    }
    if video.has_static_hdr() {
        tracing::info!("Static HDR10 metadata detected");
    } else if !video.has_dv() {
        tracing::info!("No Dolby Vision or HDR10 metadata detected");
    }
}
