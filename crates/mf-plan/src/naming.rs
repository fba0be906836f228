//! Output file naming.
//!
//! Produces names like `Movie Name (2020) [2160p HEVC CQ19 DV].mkv` from the
//! source file name, the video stream and the resolution. A Profile 5 safety
//! override is labelled `P5` after the `DV` tag.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use mf_core::config::CollisionPolicy;
use mf_core::{EncoderSettings, VideoCodec, VideoMode};
use mf_probe::VideoStreamInfo;
use regex::Regex;

use crate::resolve::Resolution;

static BRACKET_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("literal regex"));
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("literal regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("literal regex"));

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Build the output file name.
///
/// `keeps_dv` says whether Dolby Vision survives into the output.
pub fn output_name(source: &Path, video: &VideoStreamInfo, resolution: &Resolution, keeps_dv: bool) -> String {
    let policy = &resolution.policy;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let (title, year) = title_and_year(&stem);

    let mut tags: Vec<String> = Vec::new();
    if let Some(res) = resolution_tag(video.width, video.height) {
        tags.push(res.to_string());
    }
    match policy.video_mode {
        VideoMode::Passthrough => {
            if let Some(codec) = codec_tag(video.codec) {
                tags.push(codec.to_string());
            }
            tags.push("REMUX".into());
        }
        VideoMode::Encode => {
            tags.push("HEVC".into());
            match &policy.encoder {
                Some(EncoderSettings::Nvenc { cq, .. }) => tags.push(format!("CQ{cq}")),
                Some(EncoderSettings::Amf { qp, .. }) => tags.push(format!("QP{qp}")),
                None => {}
            }
        }
    }
    if keeps_dv {
        tags.push("DV".into());
    }
    if resolution.safety_override {
        tags.push("P5".into());
    }

    let base = match year {
        Some(year) if !title.contains(&format!("({year})")) => format!("{title} ({year})"),
        _ => title,
    };
    let name = format!("{base} [{}].mkv", tags.join(" "));
    let name = WHITESPACE.replace_all(name.trim(), " ");
    name.chars().filter(|c| !FORBIDDEN.contains(c)).collect()
}

/// Split a release-style stem into a clean title and the release year.
fn title_and_year(stem: &str) -> (String, Option<String>) {
    let without_tags = BRACKET_TAG.replace_all(stem, "");
    let spaced = without_tags.replace(['.', '_'], " ");
    let spaced = WHITESPACE.replace_all(spaced.trim(), " ").to_string();

    if let Some(m) = YEAR.find_iter(&spaced).last() {
        let title = spaced[..m.start()]
            .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
            .to_string();
        if !title.is_empty() {
            return (title, Some(m.as_str().to_string()));
        }
    }
    (spaced, None)
}

fn resolution_tag(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        None
    } else if width >= 3800 || height >= 2100 {
        Some("2160p")
    } else if width >= 1900 || height >= 1000 {
        Some("1080p")
    } else if width >= 1200 || height >= 700 {
        Some("720p")
    } else {
        None
    }
}

fn codec_tag(codec: VideoCodec) -> Option<&'static str> {
    match codec {
        VideoCodec::Hevc => Some("HEVC"),
        VideoCodec::H264 => Some("H.264"),
        VideoCodec::Vp9 => Some("VP9"),
        VideoCodec::Av1 => Some("AV1"),
        VideoCodec::Mpeg2 => Some("MPEG2"),
        VideoCodec::Other => None,
    }
}

/// Where the output should go, given what already exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write here.
    Fresh(PathBuf),
    /// The desired path is taken and the policy says skip.
    Exists(PathBuf),
}

/// Apply the collision policy to `dir/name`. `exists` is the filesystem
/// probe, injected so naming stays testable.
pub fn resolve_collision(
    dir: &Path,
    name: &str,
    policy: CollisionPolicy,
    exists: impl Fn(&Path) -> bool,
) -> OutputTarget {
    let desired = dir.join(name);
    if !exists(&desired) {
        return OutputTarget::Fresh(desired);
    }
    match policy {
        CollisionPolicy::Skip => OutputTarget::Exists(desired),
        CollisionPolicy::Rename => {
            let (base, ext) = match name.rsplit_once('.') {
                Some((b, e)) => (b, format!(".{e}")),
                None => (name, String::new()),
            };
            (1..)
                .map(|n| dir.join(format!("{base} ({n}){ext}")))
                .find(|candidate| !exists(candidate))
                .map_or(OutputTarget::Exists(desired), OutputTarget::Fresh)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{h264, hevc, nvenc, with_dv};
    use crate::resolve::resolve;
    use mf_core::{AmfQuality, ConversionPolicy};

    #[test]
    fn encode_name_with_dv() {
        let name = output_name(
            Path::new("/m/Movie.Name.2020.2160p.UHD.BluRay.mkv"),
            &hevc(),
            &resolve(&ConversionPolicy::encode(nvenc()), &hevc()),
            true,
        );
        assert_eq!(name, "Movie Name (2020) [2160p HEVC CQ19 DV].mkv");
    }

    #[test]
    fn passthrough_name() {
        let name = output_name(
            Path::new("/m/Some_Film_1999_[Group].mkv"),
            &h264(),
            &resolve(&ConversionPolicy::passthrough(), &h264()),
            false,
        );
        assert_eq!(name, "Some Film (1999) [1080p H.264 REMUX].mkv");
    }

    #[test]
    fn amf_quality_tag() {
        let amf = EncoderSettings::Amf {
            quality: AmfQuality::Quality,
            qp: 20,
        };
        let name = output_name(
            Path::new("/m/Film (2001).mkv"),
            &h264(),
            &resolve(&ConversionPolicy::encode(amf), &h264()),
            false,
        );
        assert_eq!(name, "Film (2001) [1080p HEVC QP20].mkv");
    }

    #[test]
    fn profile5_override_is_labelled() {
        let video = with_dv(hevc(), 5);
        let overridden = resolve(&ConversionPolicy::encode(nvenc()), &video);
        assert!(overridden.safety_override);
        let name = output_name(Path::new("/m/Movie.Name.2020.mkv"), &video, &overridden, true);
        assert_eq!(name, "Movie Name (2020) [2160p HEVC REMUX DV P5].mkv");

        let requested = resolve(&ConversionPolicy::passthrough(), &video);
        assert!(!requested.safety_override);
        let name = output_name(Path::new("/m/Movie.Name.2020.mkv"), &video, &requested, true);
        assert_eq!(name, "Movie Name (2020) [2160p HEVC REMUX DV].mkv");
    }

    #[test]
    fn last_year_wins_and_numeric_titles_survive() {
        assert_eq!(
            title_and_year("Blade.Runner.2049.2017.2160p"),
            ("Blade Runner 2049".to_string(), Some("2017".to_string()))
        );
        assert_eq!(title_and_year("1917"), ("1917".to_string(), None));
        assert_eq!(title_and_year("No Year Here"), ("No Year Here".to_string(), None));
    }

    #[test]
    fn forbidden_characters_removed() {
        let name = output_name(
            Path::new("/m/What? Now: 2010.mkv"),
            &hevc(),
            &resolve(&ConversionPolicy::passthrough(), &hevc()),
            false,
        );
        assert_eq!(name, "What Now (2010) [2160p HEVC REMUX].mkv");
    }

    #[test]
    fn collision_skip_and_rename() {
        let taken = [PathBuf::from("/out/Film.mkv"), PathBuf::from("/out/Film (1).mkv")];
        let exists = |p: &Path| taken.iter().any(|t| t == p);

        assert_eq!(
            resolve_collision(Path::new("/out"), "Other.mkv", CollisionPolicy::Skip, exists),
            OutputTarget::Fresh(PathBuf::from("/out/Other.mkv"))
        );
        assert_eq!(
            resolve_collision(Path::new("/out"), "Film.mkv", CollisionPolicy::Skip, exists),
            OutputTarget::Exists(PathBuf::from("/out/Film.mkv"))
        );
        assert_eq!(
            resolve_collision(Path::new("/out"), "Film.mkv", CollisionPolicy::Rename, exists),
            OutputTarget::Fresh(PathBuf::from("/out/Film (2).mkv"))
        );
    }
}
