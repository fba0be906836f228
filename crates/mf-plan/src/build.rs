//! Expands a [`VideoStrategy`] into the ordered tool chain producing the
//! video stream handed to the muxer.

use std::path::{Path, PathBuf};

use mf_av::Workspace;
use mf_core::{ConversionPolicy, EncoderSettings, Error, Result};
use mf_probe::{MasteringDisplay, VideoStreamInfo};
use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::operation::Operation;
use crate::strategy::{DvTransform, RpuHandling, VideoStrategy};

/// Whether the video result is a bare bitstream or sits inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    RawElementary,
    Container,
}

/// The video stream as handed to the muxer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoResult {
    pub path: PathBuf,
    pub kind: ContainerKind,
    /// mkvmerge track id of the video inside `path`.
    pub track_selector: String,
}

/// Operations and temp files of the video chain.
#[derive(Debug, Clone, Serialize)]
pub struct VideoPipeline {
    pub operations: Vec<Operation>,
    pub temp_files: Vec<PathBuf>,
    pub result: VideoResult,
    pub diagnostics: Vec<Diagnostic>,
}

/// Singly-linked chain of bitstream edits. Each step consumes `current` and
/// produces the next file.
struct Chain<'a> {
    ws: &'a Workspace,
    operations: Vec<Operation>,
    temp_files: Vec<PathBuf>,
    current: PathBuf,
}

impl<'a> Chain<'a> {
    fn starting_at(ws: &'a Workspace, current: PathBuf) -> Self {
        Self {
            ws,
            operations: Vec::new(),
            temp_files: Vec::new(),
            current,
        }
    }

    fn temp(&mut self, role: &str, ext: &str) -> PathBuf {
        let path = self.ws.temp_file(role, ext);
        if !self.temp_files.contains(&path) {
            self.temp_files.push(path.clone());
        }
        path
    }

    /// Push an operation whose output becomes the new head of the chain.
    fn advance(&mut self, op: Operation, output: PathBuf) {
        self.operations.push(op);
        self.current = output;
    }

    fn finish(self, diagnostics: Vec<Diagnostic>) -> VideoPipeline {
        VideoPipeline {
            operations: self.operations,
            temp_files: self.temp_files,
            result: VideoResult {
                path: self.current,
                kind: ContainerKind::RawElementary,
                track_selector: "0".into(),
            },
            diagnostics,
        }
    }
}

/// Build the video chain for `strategy`.
///
/// # Errors
///
/// Returns [`Error::Planning`] when hybrid passthrough is asked of a non-HEVC
/// stream or an encode strategy has no encoder in `policy`.
pub fn build_video(
    strategy: &VideoStrategy,
    policy: &ConversionPolicy,
    video: &VideoStreamInfo,
    source: &Path,
    ws: &Workspace,
) -> Result<VideoPipeline> {
    match strategy {
        VideoStrategy::PurePassthrough => Ok(VideoPipeline {
            operations: Vec::new(),
            temp_files: Vec::new(),
            result: VideoResult {
                path: source.to_path_buf(),
                kind: ContainerKind::Container,
                track_selector: video.index.to_string(),
            },
            diagnostics: Vec::new(),
        }),
        VideoStrategy::HybridPassthrough { dv, strip_hdr10plus } => {
            if !video.codec.is_hevc() {
                return Err(Error::planning(format!(
                    "hybrid passthrough edits HEVC bitstreams, but the source video is {}",
                    video.codec_name
                )));
            }
            Ok(hybrid(*dv, *strip_hdr10plus, video, source, ws))
        }
        VideoStrategy::UnifiedEncode { rpu, carry_hdr10plus } => {
            let encoder = require_encoder(policy, strategy)?;
            Ok(unified(*rpu, *carry_hdr10plus, encoder, video, source, ws))
        }
        VideoStrategy::SimpleEncode { static_metadata } => {
            let encoder = require_encoder(policy, strategy)?;
            Ok(simple(*static_metadata, encoder, video, source, ws))
        }
    }
}

fn require_encoder<'p>(policy: &'p ConversionPolicy, strategy: &VideoStrategy) -> Result<&'p EncoderSettings> {
    policy.encoder.as_ref().ok_or_else(|| {
        Error::planning(format!(
            "{strategy} needs a hardware encoder, but none is configured or detected"
        ))
    })
}

fn extract_raw(chain: &mut Chain<'_>, video: &VideoStreamInfo, source: &Path) -> PathBuf {
    let raw = chain.temp("video_raw", "hevc");
    let op = Operation::new("extract-raw", "mkvextract")
        .arg("tracks")
        .path_arg(source)
        .arg(format!("{}:{}", video.index, raw.display()))
        .reads(source)
        .writes(&raw);
    chain.advance(op, raw.clone());
    raw
}

fn hybrid(
    dv: Option<DvTransform>,
    strip_hdr10plus: bool,
    video: &VideoStreamInfo,
    source: &Path,
    ws: &Workspace,
) -> VideoPipeline {
    let mut chain = Chain::starting_at(ws, source.to_path_buf());
    extract_raw(&mut chain, video, source);

    match dv {
        Some(DvTransform::ConvertToP8) => {
            let out = chain.temp("video_p8", "hevc");
            let op = Operation::new("dv-convert", "dovi_tool")
                .args(["-m", "2", "convert"])
                .input_flag("-i", &chain.current)
                .output_flag("-o", &out);
            chain.advance(op, out);
        }
        Some(DvTransform::Remove) => {
            let out = chain.temp("video_no_dv", "hevc");
            let op = Operation::new("dv-remove", "dovi_tool")
                .arg("remove")
                .input_flag("-i", &chain.current)
                .output_flag("-o", &out);
            chain.advance(op, out);
        }
        None => {}
    }

    if strip_hdr10plus {
        let out = chain.temp("video_no_hdr10plus", "hevc");
        let op = Operation::new("hdr10plus-remove", "hdr10plus_tool")
            .arg("remove")
            .input_flag("-i", &chain.current)
            .output_flag("-o", &out);
        chain.advance(op, out);
    }

    chain.finish(Vec::new())
}

fn unified(
    rpu: RpuHandling,
    carry_hdr10plus: bool,
    encoder: &EncoderSettings,
    video: &VideoStreamInfo,
    source: &Path,
    ws: &Workspace,
) -> VideoPipeline {
    let mut diagnostics = Vec::new();
    let mut chain = Chain::starting_at(ws, source.to_path_buf());
    let raw = extract_raw(&mut chain, video, source);

    let original_rpu = if rpu == RpuHandling::Discard {
        None
    } else {
        let path = chain.temp("RPU_original", "bin");
        chain.operations.push(
            Operation::new("extract-rpu", "dovi_tool")
                .arg("extract-rpu")
                .input_flag("-i", &raw)
                .output_flag("-o", &path),
        );
        Some(path)
    };

    let converted = chain.temp("video_converted", "hevc");
    let mut encode = Operation::new("encode", "ffmpeg").arg("-y");
    match video.frame_rate.as_deref().filter(|r| is_usable_rate(r)) {
        Some(rate) => encode = encode.args(["-framerate", rate]),
        None => diagnostics.push(Diagnostic::warn(
            "Source frame rate unknown; ffmpeg will guess the rate of the raw stream",
        )),
    }
    let encode = encode
        .input_flag("-i", &raw)
        .args(encoder_args(encoder))
        .path_arg(&converted)
        .writes(&converted);
    chain.advance(encode, converted);

    if let Some(original) = original_rpu {
        let rpu_file = if rpu == RpuHandling::ConvertAndReinject {
            let editor = chain.temp("editor", "json");
            let p8 = chain.temp("RPU_P8_converted", "bin");
            chain.operations.push(
                Operation::new("convert-rpu", "dovi_tool")
                    .arg("editor")
                    .input_flag("-i", &original)
                    .arg("-j")
                    .path_arg(&editor)
                    // Editor mode 2 converts a Profile 7 RPU to 8.1.
                    .stage(&editor, serde_json::json!({ "mode": 2 }).to_string())
                    .output_flag("-o", &p8),
            );
            p8
        } else {
            original
        };

        let out = chain.temp("video_final_dv", "hevc");
        let op = Operation::new("inject-rpu", "dovi_tool")
            .arg("inject-rpu")
            .input_flag("-i", &chain.current)
            .input_flag("-r", &rpu_file)
            .output_flag("-o", &out);
        chain.advance(op, out);
    }

    if carry_hdr10plus {
        let json = chain.temp("hdr10plus", "json");
        chain.operations.push(
            Operation::new("extract-hdr10plus", "hdr10plus_tool")
                .arg("extract")
                .input_flag("-i", &raw)
                .output_flag("-o", &json),
        );

        let out = chain.temp("video_with_hdr10plus", "hevc");
        let op = Operation::new("inject-hdr10plus", "hdr10plus_tool")
            .arg("inject")
            .input_flag("-i", &chain.current)
            .input_flag("-j", &json)
            .output_flag("-o", &out);
        chain.advance(op, out);
    }

    chain.finish(diagnostics)
}

fn simple(
    static_metadata: bool,
    encoder: &EncoderSettings,
    video: &VideoStreamInfo,
    source: &Path,
    ws: &Workspace,
) -> VideoPipeline {
    let mut chain = Chain::starting_at(ws, source.to_path_buf());
    let converted = chain.temp("video_converted", "hevc");

    let mut op = Operation::new("encode", "ffmpeg")
        .arg("-y")
        .input_flag("-i", source)
        .args(["-map".to_string(), format!("0:{}", video.index)]);
    if static_metadata {
        op = op.args(["-map_metadata:s:v".to_string(), format!("0:s:{}", video.index)]);
    }
    op = op.args(["-an", "-sn"]).args(encoder_args(encoder));
    if static_metadata {
        if let Some(md) = &video.mastering_display {
            op = op.args(["-metadata".to_string(), format!("mastering-display={}", mastering_display_arg(md))]);
        }
        if let Some(cl) = &video.content_light {
            op = op.args(["-metadata".to_string(), format!("max-cll={},{}", cl.max_cll, cl.max_fall)]);
        }
    }
    let op = op.path_arg(&converted).writes(&converted);
    chain.advance(op, converted);

    chain.finish(Vec::new())
}

/// ffmpeg arguments selecting and configuring the hardware HEVC encoder.
pub fn encoder_args(encoder: &EncoderSettings) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), encoder.kind().ffmpeg_name().to_string()];
    match encoder {
        EncoderSettings::Nvenc { preset, cq } => {
            args.push("-preset".to_string());
            args.push(preset.clone());
            args.push("-cq".to_string());
            args.push(cq.to_string());
        }
        EncoderSettings::Amf { quality, qp } => {
            args.push("-rc".to_string());
            args.push("cqp".to_string());
            for flag in ["-qp_p", "-qp_i", "-qp_b"] {
                args.push(flag.to_string());
                args.push(qp.to_string());
            }
            args.push("-quality".to_string());
            args.push(quality.to_string());
        }
    }
    args.push("-pix_fmt".to_string());
    args.push("p010le".to_string());
    args
}

/// `G(x,y)B(x,y)R(x,y)WP(x,y)L(max,min)` in chromaticity and cd/m² units.
fn mastering_display_arg(md: &MasteringDisplay) -> String {
    format!(
        "G({:.4},{:.4})B({:.4},{:.4})R({:.4},{:.4})WP({:.4},{:.4})L({:.4},{:.4})",
        md.green.0,
        md.green.1,
        md.blue.0,
        md.blue.1,
        md.red.0,
        md.red.1,
        md.white_point.0,
        md.white_point.1,
        md.max_luminance,
        md.min_luminance
    )
}

fn is_usable_rate(rate: &str) -> bool {
    mf_probe::parse_rational(rate).is_some_and(|fps| fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{h264, hevc, nvenc, with_dv, with_hdr10plus, with_static_hdr};
    use crate::strategy::select;
    use assert_matches::assert_matches;
    use mf_core::{AmfQuality, DvPolicy, Hdr10PlusPolicy};

    fn ws() -> Workspace {
        Workspace::new(Path::new("/media/movie.mkv"), Path::new("/work"))
    }

    fn steps(p: &VideoPipeline) -> Vec<&str> {
        p.operations.iter().map(|o| o.step.as_str()).collect()
    }

    fn plan(policy: &ConversionPolicy, video: &VideoStreamInfo) -> VideoPipeline {
        let (strategy, _) = select(policy, video);
        build_video(&strategy, policy, video, Path::new("/media/movie.mkv"), &ws()).unwrap()
    }

    #[test]
    fn pure_passthrough_has_no_operations() {
        let p = plan(&ConversionPolicy::passthrough(), &with_dv(hevc(), 8));
        assert!(p.operations.is_empty());
        assert!(p.temp_files.is_empty());
        assert_eq!(p.result.kind, ContainerKind::Container);
        assert_eq!(p.result.path, PathBuf::from("/media/movie.mkv"));
        assert_eq!(p.result.track_selector, "0");
    }

    #[test]
    fn profile7_encode_chain_order() {
        let p = plan(&ConversionPolicy::encode(nvenc()), &with_dv(hevc(), 7));
        assert_eq!(
            steps(&p),
            vec!["extract-raw", "extract-rpu", "encode", "convert-rpu", "inject-rpu"]
        );

        let convert = &p.operations[3];
        assert_eq!(convert.staged.len(), 1);
        assert_eq!(convert.staged[0].contents, r#"{"mode":2}"#);
        assert!(convert.args.iter().any(|a| a.ends_with("_temp_editor.json")));

        // inject-rpu reads the converted RPU, not the original.
        let inject = &p.operations[4];
        assert!(inject.inputs.iter().any(|i| i.to_string_lossy().ends_with("_temp_RPU_P8_converted.bin")));
        assert_eq!(p.result.path, inject.outputs[0]);
        assert_eq!(p.result.kind, ContainerKind::RawElementary);
        assert_eq!(p.result.track_selector, "0");
    }

    #[test]
    fn profile8_encode_skips_conversion() {
        let p = plan(&ConversionPolicy::encode(nvenc()), &with_dv(hevc(), 8));
        assert_eq!(steps(&p), vec!["extract-raw", "extract-rpu", "encode", "inject-rpu"]);
        let inject = &p.operations[3];
        assert!(inject.inputs.iter().any(|i| i.to_string_lossy().ends_with("_temp_RPU_original.bin")));
    }

    #[test]
    fn hdr10plus_is_extracted_from_raw_and_injected_last() {
        let video = with_hdr10plus(with_dv(hevc(), 8));
        let p = plan(&ConversionPolicy::encode(nvenc()), &video);
        assert_eq!(
            steps(&p),
            vec![
                "extract-raw",
                "extract-rpu",
                "encode",
                "inject-rpu",
                "extract-hdr10plus",
                "inject-hdr10plus"
            ]
        );
        let raw = &p.operations[0].outputs[0];
        assert_eq!(&p.operations[4].inputs[0], raw);
        // HDR10+ goes into the DV-injected stream.
        assert_eq!(p.operations[5].inputs[0], p.operations[3].outputs[0]);
        assert!(p.result.path.to_string_lossy().ends_with("_temp_video_with_hdr10plus.hevc"));
    }

    #[test]
    fn unified_encode_args() {
        let p = plan(&ConversionPolicy::encode(nvenc()), &with_hdr10plus(hevc()));
        let encode = p.operations.iter().find(|o| o.step == "encode").unwrap();
        assert_eq!(&encode.args[..5], &["-y", "-framerate", "24000/1001", "-i", encode.inputs[0].to_str().unwrap()]);
        assert!(encode.args.windows(2).any(|w| w == ["-c:v", "hevc_nvenc"]));
        assert!(encode.args.last().unwrap().ends_with("_temp_video_converted.hevc"));
    }

    #[test]
    fn unified_encode_without_rate_warns() {
        let mut video = with_hdr10plus(hevc());
        video.frame_rate = Some("0/0".into());
        let p = plan(&ConversionPolicy::encode(nvenc()), &video);
        let encode = p.operations.iter().find(|o| o.step == "encode").unwrap();
        assert!(!encode.args.contains(&"-framerate".to_string()));
        assert_eq!(p.diagnostics.len(), 1);
    }

    #[test]
    fn h264_encode_is_single_operation() {
        let p = plan(&ConversionPolicy::encode(nvenc()), &h264());
        assert_eq!(steps(&p), vec!["encode"]);
        let encode = &p.operations[0];
        assert_eq!(encode.inputs, vec![PathBuf::from("/media/movie.mkv")]);
        assert!(encode.args.windows(2).any(|w| w == ["-map", "0:0"]));
        assert!(encode.args.windows(2).any(|w| w == ["-map_metadata:s:v", "0:s:0"]));
        assert!(encode.args.windows(2).any(|w| w == ["-an", "-sn"]));
        assert_eq!(p.result.kind, ContainerKind::RawElementary);
    }

    #[test]
    fn simple_encode_passes_static_hdr() {
        let p = plan(&ConversionPolicy::encode(nvenc()), &with_static_hdr(hevc()));
        let args = &p.operations[0].args;
        assert!(args.contains(
            &"mastering-display=G(0.2650,0.6900)B(0.1500,0.0600)R(0.6800,0.3200)WP(0.3127,0.3290)L(1000.0000,0.0050)"
                .to_string()
        ));
        assert!(args.contains(&"max-cll=1000,400".to_string()));
    }

    #[test]
    fn simple_encode_with_dynamic_metadata_skips_static_flags() {
        let video = with_static_hdr(with_hdr10plus(h264()));
        let p = plan(&ConversionPolicy::encode(nvenc()), &video);
        let args = &p.operations[0].args;
        assert!(!args.iter().any(|a| a.starts_with("-map_metadata") || a == "-metadata"));
    }

    #[test]
    fn hdr10plus_drop_passthrough() {
        let policy = ConversionPolicy::passthrough().with_hdr10plus_policy(Hdr10PlusPolicy::Drop);
        let p = plan(&policy, &with_hdr10plus(hevc()));
        assert_eq!(steps(&p), vec!["extract-raw", "hdr10plus-remove"]);
        assert_eq!(p.operations[1].args[0], "remove");
        assert_eq!(p.result.track_selector, "0");
    }

    #[test]
    fn hybrid_chain_is_linked() {
        let video = with_hdr10plus(with_dv(hevc(), 7));
        let policy = ConversionPolicy::passthrough()
            .with_dv_policy(DvPolicy::Convert7To8)
            .with_hdr10plus_policy(Hdr10PlusPolicy::Drop);
        let p = plan(&policy, &video);
        assert_eq!(steps(&p), vec!["extract-raw", "dv-convert", "hdr10plus-remove"]);
        assert_eq!(&p.operations[1].args[..3], &["-m", "2", "convert"]);
        for pair in p.operations.windows(2) {
            assert_eq!(pair[1].inputs[0], pair[0].outputs[0]);
        }
        assert_eq!(p.result.path, p.operations[2].outputs[0]);
    }

    #[test]
    fn hybrid_rejects_non_hevc() {
        let strategy = VideoStrategy::HybridPassthrough {
            dv: Some(DvTransform::Remove),
            strip_hdr10plus: false,
        };
        let err = build_video(
            &strategy,
            &ConversionPolicy::passthrough(),
            &h264(),
            Path::new("/media/movie.mkv"),
            &ws(),
        )
        .unwrap_err();
        assert_matches!(err, Error::Planning(_));
    }

    #[test]
    fn encode_without_encoder_is_planning_error() {
        let mut policy = ConversionPolicy::encode(nvenc());
        policy.encoder = None;
        let (strategy, _) = select(&policy, &h264());
        let err = build_video(&strategy, &policy, &h264(), Path::new("/m.mkv"), &ws()).unwrap_err();
        assert!(err.to_string().contains("simple-encode"));
    }

    #[test]
    fn temp_files_cover_every_intermediate() {
        let video = with_hdr10plus(with_dv(hevc(), 7));
        let p = plan(&ConversionPolicy::encode(nvenc()), &video);
        for op in &p.operations {
            for file in op.files().filter(|f| f.as_path() != Path::new("/media/movie.mkv")) {
                assert!(p.temp_files.contains(file), "{} not declared", file.display());
            }
        }
        assert_eq!(p.temp_files.len(), 8);
    }

    #[test]
    fn encoder_argument_forms() {
        assert_eq!(
            encoder_args(&nvenc()),
            vec!["-c:v", "hevc_nvenc", "-preset", "p7", "-cq", "19", "-pix_fmt", "p010le"]
        );
        let amf = EncoderSettings::Amf {
            quality: AmfQuality::Balanced,
            qp: 22,
        };
        assert_eq!(
            encoder_args(&amf),
            vec![
                "-c:v", "hevc_amf", "-rc", "cqp", "-qp_p", "22", "-qp_i", "22", "-qp_b", "22", "-quality",
                "balanced", "-pix_fmt", "p010le"
            ]
        );
    }
}
