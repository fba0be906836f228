//! Media-domain enums shared by the probe, planning and pipeline crates.
//!
//! All enums serialize in lowercase and implement `Display` manually for a
//! consistent string representation in logs and plan output.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// VideoCodec
// ---------------------------------------------------------------------------

/// Video codec families the planner distinguishes between.
///
/// Only HEVC sources can take the metadata-preserving paths; everything else
/// is carried along so naming and diagnostics can report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Hevc,
    Av1,
    Vp9,
    Mpeg2,
    Other,
}

impl VideoCodec {
    /// Map an ffprobe `codec_name` onto a codec family.
    pub fn from_codec_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "avc1" => Self::H264,
            "hevc" | "h265" | "hvc1" | "hev1" => Self::Hevc,
            "av1" => Self::Av1,
            "vp9" => Self::Vp9,
            "mpeg2video" | "mpeg2" => Self::Mpeg2,
            _ => Self::Other,
        }
    }

    /// Whether this is an HEVC stream.
    pub fn is_hevc(self) -> bool {
        self == Self::Hevc
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::Hevc => write!(f, "hevc"),
            Self::Av1 => write!(f, "av1"),
            Self::Vp9 => write!(f, "vp9"),
            Self::Mpeg2 => write!(f, "mpeg2"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// TrackKind
// ---------------------------------------------------------------------------

/// Kind of a non-video track carried into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
        }
    }
}
