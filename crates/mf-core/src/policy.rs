//! Conversion policy types.
//!
//! A [`ConversionPolicy`] is what the user (or config file) asks for. The
//! planner resolves it against the probed streams before any tool runs; see
//! `mf_plan::resolve`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Inclusive range accepted for NVENC `-cq` and AMF `-qp_*` values.
pub const QUALITY_RANGE: std::ops::RangeInclusive<u8> = 10..=40;

const NVENC_PRESETS: &[&str] = &["p1", "p2", "p3", "p4", "p5", "p6", "p7"];

/// Whether the video stream is re-encoded or carried over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    #[default]
    Encode,
    Passthrough,
}

impl fmt::Display for VideoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "encode"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// What to do with Dolby Vision metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DvPolicy {
    #[default]
    Keep,
    Drop,
    #[serde(rename = "convert7_to_8")]
    Convert7To8,
}

impl fmt::Display for DvPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "keep"),
            Self::Drop => write!(f, "drop"),
            Self::Convert7To8 => write!(f, "convert7_to_8"),
        }
    }
}

/// What to do with HDR10+ dynamic metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hdr10PlusPolicy {
    #[default]
    Keep,
    Drop,
}

impl fmt::Display for Hdr10PlusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "keep"),
            Self::Drop => write!(f, "drop"),
        }
    }
}

/// When the final bulk cleanup removes remaining temp files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    #[default]
    OnSuccess,
    Always,
    Never,
    Ask,
}

impl fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnSuccess => write!(f, "on_success"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Hardware encoder families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Nvenc,
    Amf,
}

impl EncoderKind {
    /// The ffmpeg encoder name.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Nvenc => "hevc_nvenc",
            Self::Amf => "hevc_amf",
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nvenc => write!(f, "nvenc"),
            Self::Amf => write!(f, "amf"),
        }
    }
}

/// AMF `-quality` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmfQuality {
    Speed,
    Balanced,
    #[default]
    Quality,
}

impl fmt::Display for AmfQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Speed => write!(f, "speed"),
            Self::Balanced => write!(f, "balanced"),
            Self::Quality => write!(f, "quality"),
        }
    }
}

/// Encoder identity plus its quality parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EncoderSettings {
    Nvenc { preset: String, cq: u8 },
    Amf { quality: AmfQuality, qp: u8 },
}

impl EncoderSettings {
    pub fn kind(&self) -> EncoderKind {
        match self {
            Self::Nvenc { .. } => EncoderKind::Nvenc,
            Self::Amf { .. } => EncoderKind::Amf,
        }
    }

    /// Check preset and quality values against what the encoders accept.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Nvenc { preset, cq } => {
                if !NVENC_PRESETS.contains(&preset.as_str()) {
                    return Err(Error::Validation(format!(
                        "nvenc preset '{preset}' is not one of p1..p7"
                    )));
                }
                if !QUALITY_RANGE.contains(cq) {
                    return Err(Error::Validation(format!(
                        "nvenc cq {cq} is outside {}..={}",
                        QUALITY_RANGE.start(),
                        QUALITY_RANGE.end()
                    )));
                }
            }
            Self::Amf { qp, .. } => {
                if !QUALITY_RANGE.contains(qp) {
                    return Err(Error::Validation(format!(
                        "amf qp {qp} is outside {}..={}",
                        QUALITY_RANGE.start(),
                        QUALITY_RANGE.end()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The user's request for how a file should be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionPolicy {
    pub video_mode: VideoMode,
    pub dv_policy: DvPolicy,
    pub hdr10plus_policy: Hdr10PlusPolicy,
    /// Present only when `video_mode` is [`VideoMode::Encode`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<EncoderSettings>,
}

impl ConversionPolicy {
    /// Passthrough with every metadata layer kept.
    pub fn passthrough() -> Self {
        Self {
            video_mode: VideoMode::Passthrough,
            dv_policy: DvPolicy::Keep,
            hdr10plus_policy: Hdr10PlusPolicy::Keep,
            encoder: None,
        }
    }

    /// Encode with the given encoder, keeping every metadata layer.
    pub fn encode(encoder: EncoderSettings) -> Self {
        Self {
            video_mode: VideoMode::Encode,
            dv_policy: DvPolicy::Keep,
            hdr10plus_policy: Hdr10PlusPolicy::Keep,
            encoder: Some(encoder),
        }
    }

    pub fn with_dv_policy(mut self, dv_policy: DvPolicy) -> Self {
        self.dv_policy = dv_policy;
        self
    }

    pub fn with_hdr10plus_policy(mut self, policy: Hdr10PlusPolicy) -> Self {
        self.hdr10plus_policy = policy;
        self
    }
}
