//! Core types for probe results.

use std::path::PathBuf;
use std::time::Duration;

use mf_core::{TrackKind, VideoCodec};
use serde::{Deserialize, Serialize};

/// Everything the planner needs to know about one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamCatalog {
    /// Path to the probed file.
    pub source: PathBuf,
    /// Container duration (if determinable).
    pub duration: Option<Duration>,
    /// The main video stream. Secondary video streams (cover art, Dolby
    /// Vision enhancement layers) are not carried.
    pub video: VideoStreamInfo,
    /// Audio streams in container order.
    pub audio: Vec<MediaTrack>,
    /// Subtitle streams in container order.
    pub subtitles: Vec<MediaTrack>,
}

impl StreamCatalog {
    /// Distinct audio languages, in order of first appearance.
    pub fn audio_languages(&self) -> Vec<&str> {
        unique_languages(&self.audio)
    }

    /// Distinct subtitle languages, in order of first appearance.
    pub fn subtitle_languages(&self) -> Vec<&str> {
        unique_languages(&self.subtitles)
    }
}

fn unique_languages(tracks: &[MediaTrack]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for t in tracks {
        if !seen.contains(&t.language.as_str()) {
            seen.push(&t.language);
        }
    }
    seen
}

/// The main video stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    /// Container-level stream index (also the mkvextract track id).
    pub index: usize,
    pub codec: VideoCodec,
    /// Raw codec name as reported by the probe (e.g. "hevc").
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    /// Frame rate as a rational string, e.g. "24000/1001".
    pub frame_rate: Option<String>,
    /// Dolby Vision info (if detected).
    pub dolby_vision: Option<DvInfo>,
    /// HDR10+ (SMPTE ST 2094-40) dynamic metadata present.
    pub hdr10plus: bool,
    /// Static HDR10 mastering display metadata.
    pub mastering_display: Option<MasteringDisplay>,
    /// Static HDR10 content light level.
    pub content_light: Option<ContentLightLevel>,
}

impl VideoStreamInfo {
    pub fn has_dv(&self) -> bool {
        self.dolby_vision.is_some()
    }

    /// Dolby Vision profile, when DV is present and the probe reported one.
    pub fn dv_profile(&self) -> Option<u8> {
        self.dolby_vision.as_ref().and_then(|dv| dv.profile)
    }

    /// Whether any dynamic HDR metadata (DV or HDR10+) is present.
    pub fn has_dynamic_metadata(&self) -> bool {
        self.has_dv() || self.hdr10plus
    }

    /// Whether static HDR10 metadata is present.
    pub fn has_static_hdr(&self) -> bool {
        self.mastering_display.is_some() || self.content_light.is_some()
    }

    /// Frame rate in frames per second.
    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.as_deref().and_then(parse_rational)
    }
}

/// Parse `"num/den"` or a plain number. A zero denominator yields `None`.
pub fn parse_rational(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => s.trim().parse().ok(),
    }
}

/// Dolby Vision information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvInfo {
    /// Dolby Vision profile. `None` when DV was inferred from stream tags
    /// without a configuration record.
    pub profile: Option<u8>,
    pub rpu_present: bool,
    pub el_present: bool,
    pub bl_present: bool,
}

/// SMPTE ST 2086 mastering display colour volume.
///
/// Chromaticity coordinates are CIE 1931 xy, luminance is in cd/m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteringDisplay {
    pub red: (f64, f64),
    pub green: (f64, f64),
    pub blue: (f64, f64),
    pub white_point: (f64, f64),
    pub max_luminance: f64,
    pub min_luminance: f64,
}

/// CTA-861.3 content light level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLightLevel {
    pub max_cll: u32,
    pub max_fall: u32,
}

/// An audio or subtitle stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub kind: TrackKind,
    /// Container-level stream index (also the mkvextract track id).
    pub index: usize,
    /// Raw codec name as reported by the probe (e.g. "truehd", "subrip").
    pub codec_name: String,
    /// Language tag, `"und"` when the stream carries none.
    pub language: String,
    pub title: Option<String>,
    /// Channel count for audio streams.
    pub channels: Option<u32>,
    pub default: bool,
    pub forced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(kind: TrackKind, index: usize, lang: &str) -> MediaTrack {
        MediaTrack {
            kind,
            index,
            codec_name: "ac3".into(),
            language: lang.into(),
            title: None,
            channels: Some(6),
            default: false,
            forced: false,
        }
    }

    fn video() -> VideoStreamInfo {
        VideoStreamInfo {
            index: 0,
            codec: VideoCodec::Hevc,
            codec_name: "hevc".into(),
            width: 3840,
            height: 2160,
            frame_rate: Some("24000/1001".into()),
            dolby_vision: None,
            hdr10plus: false,
            mastering_display: None,
            content_light: None,
        }
    }

    #[test]
    fn rational_parsing() {
        assert!((parse_rational("24000/1001").unwrap() - 23.976).abs() < 0.001);
        assert_eq!(parse_rational("25"), Some(25.0));
        assert_eq!(parse_rational("30/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }

    #[test]
    fn languages_keep_first_appearance_order() {
        let catalog = StreamCatalog {
            source: PathBuf::from("/m.mkv"),
            duration: None,
            video: video(),
            audio: vec![
                track(TrackKind::Audio, 1, "pol"),
                track(TrackKind::Audio, 2, "eng"),
                track(TrackKind::Audio, 3, "pol"),
            ],
            subtitles: vec![],
        };
        assert_eq!(catalog.audio_languages(), vec!["pol", "eng"]);
        assert!(catalog.subtitle_languages().is_empty());
    }

    #[test]
    fn dynamic_metadata_flags() {
        let mut v = video();
        assert!(!v.has_dynamic_metadata());
        assert_eq!(v.dv_profile(), None);

        v.hdr10plus = true;
        assert!(v.has_dynamic_metadata());

        v.hdr10plus = false;
        v.dolby_vision = Some(DvInfo {
            profile: Some(7),
            rpu_present: true,
            el_present: true,
            bl_present: true,
        });
        assert!(v.has_dv());
        assert_eq!(v.dv_profile(), Some(7));
        assert!((v.fps().unwrap() - 23.976).abs() < 0.001);
    }
}
