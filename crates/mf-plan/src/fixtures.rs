//! Shared test fixtures.

use std::path::PathBuf;

use mf_core::{EncoderSettings, TrackKind, VideoCodec};
use mf_probe::{ContentLightLevel, DvInfo, MasteringDisplay, MediaTrack, StreamCatalog, VideoStreamInfo};

pub fn hevc() -> VideoStreamInfo {
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

pub fn h264() -> VideoStreamInfo {
    VideoStreamInfo {
        codec: VideoCodec::H264,
        codec_name: "h264".into(),
        width: 1920,
        height: 1080,
        ..hevc()
    }
}

pub fn with_dv(mut video: VideoStreamInfo, profile: u8) -> VideoStreamInfo {
    video.dolby_vision = Some(DvInfo {
        profile: Some(profile),
        rpu_present: true,
        el_present: profile == 7,
        bl_present: true,
    });
    video
}

pub fn with_hdr10plus(mut video: VideoStreamInfo) -> VideoStreamInfo {
    video.hdr10plus = true;
    video
}

pub fn with_static_hdr(mut video: VideoStreamInfo) -> VideoStreamInfo {
    video.mastering_display = Some(MasteringDisplay {
        red: (0.68, 0.32),
        green: (0.265, 0.69),
        blue: (0.15, 0.06),
        white_point: (0.3127, 0.329),
        max_luminance: 1000.0,
        min_luminance: 0.005,
    });
    video.content_light = Some(ContentLightLevel {
        max_cll: 1000,
        max_fall: 400,
    });
    video
}

pub fn nvenc() -> EncoderSettings {
    EncoderSettings::Nvenc {
        preset: "p7".into(),
        cq: 19,
    }
}

pub fn track(kind: TrackKind, index: usize, lang: &str, codec: &str) -> MediaTrack {
    MediaTrack {
        kind,
        index,
        codec_name: codec.into(),
        language: lang.into(),
        title: None,
        channels: (kind == TrackKind::Audio).then_some(6),
        default: false,
        forced: false,
    }
}

pub fn catalog(video: VideoStreamInfo) -> StreamCatalog {
    StreamCatalog {
        source: PathBuf::from("/media/Movie.Name.2020.2160p.mkv"),
        duration: None,
        video,
        audio: vec![
            track(TrackKind::Audio, 1, "eng", "truehd"),
            track(TrackKind::Audio, 2, "eng", "ac3"),
            track(TrackKind::Audio, 3, "pol", "ac3"),
        ],
        subtitles: vec![
            track(TrackKind::Subtitle, 4, "eng", "hdmv_pgs_subtitle"),
            track(TrackKind::Subtitle, 5, "pol", "subrip"),
        ],
    }
}
