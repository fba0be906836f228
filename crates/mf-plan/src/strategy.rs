//! Video strategy selection.

use mf_core::{ConversionPolicy, DvPolicy, Hdr10PlusPolicy, VideoMode};
use mf_probe::VideoStreamInfo;
use serde::Serialize;
use std::fmt;

use crate::diagnostic::Diagnostic;

/// Bitstream-level Dolby Vision change applied during hybrid passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DvTransform {
    /// Profile 7 dual layer to Profile 8.1 (`dovi_tool -m 2 convert`).
    ConvertToP8,
    /// Strip the RPU entirely.
    Remove,
}

/// What happens to the Dolby Vision RPU across a re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RpuHandling {
    /// No RPU reaches the output.
    Discard,
    /// Extract the Profile 8 RPU and inject it into the encode.
    Reinject,
    /// Extract the Profile 7 RPU, convert it to Profile 8.1, then inject.
    ConvertAndReinject,
}

/// How the video stream gets from source to mux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoStrategy {
    /// Muxer copies the video track straight from the source.
    PurePassthrough,
    /// Extract the HEVC bitstream and edit its metadata without re-encoding.
    HybridPassthrough {
        dv: Option<DvTransform>,
        strip_hdr10plus: bool,
    },
    /// Re-encode an HEVC bitstream and re-inject dynamic metadata.
    UnifiedEncode {
        rpu: RpuHandling,
        carry_hdr10plus: bool,
    },
    /// Single ffmpeg encode from the source container.
    SimpleEncode {
        /// Map and pass static HDR10 metadata through ffmpeg.
        static_metadata: bool,
    },
}

impl VideoStrategy {
    /// Short name used in logs and plan output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PurePassthrough => "pure-passthrough",
            Self::HybridPassthrough { .. } => "hybrid-passthrough",
            Self::UnifiedEncode { .. } => "unified-encode",
            Self::SimpleEncode { .. } => "simple-encode",
        }
    }

    pub fn is_encode(&self) -> bool {
        matches!(self, Self::UnifiedEncode { .. } | Self::SimpleEncode { .. })
    }

    /// Whether Dolby Vision metadata from `video` reaches the output.
    pub fn keeps_dolby_vision(&self, video: &VideoStreamInfo) -> bool {
        if !video.has_dv() {
            return false;
        }
        match self {
            Self::PurePassthrough => true,
            Self::HybridPassthrough { dv, .. } => *dv != Some(DvTransform::Remove),
            Self::UnifiedEncode { rpu, .. } => *rpu != RpuHandling::Discard,
            Self::SimpleEncode { .. } => false,
        }
    }

    /// Whether HDR10+ metadata from `video` reaches the output.
    pub fn keeps_hdr10plus(&self, video: &VideoStreamInfo) -> bool {
        if !video.hdr10plus {
            return false;
        }
        match self {
            Self::PurePassthrough => true,
            Self::HybridPassthrough {
                strip_hdr10plus, ..
            } => !strip_hdr10plus,
            Self::UnifiedEncode {
                carry_hdr10plus, ..
            } => *carry_hdr10plus,
            Self::SimpleEncode { .. } => false,
        }
    }
}

impl fmt::Display for VideoStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the strategy for a resolved policy. Total: every input maps to
/// exactly one strategy.
pub fn select(policy: &ConversionPolicy, video: &VideoStreamInfo) -> (VideoStrategy, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let strategy = match policy.video_mode {
        VideoMode::Passthrough => {
            let dv = match policy.dv_policy {
                DvPolicy::Convert7To8 if video.dv_profile() == Some(7) => Some(DvTransform::ConvertToP8),
                DvPolicy::Drop if video.has_dv() => Some(DvTransform::Remove),
                _ => None,
            };
            let strip_hdr10plus = policy.hdr10plus_policy == Hdr10PlusPolicy::Drop && video.hdr10plus;

            if dv.is_none() && !strip_hdr10plus {
                VideoStrategy::PurePassthrough
            } else {
                VideoStrategy::HybridPassthrough { dv, strip_hdr10plus }
            }
        }
        VideoMode::Encode if video.codec.is_hevc() && video.has_dynamic_metadata() => {
            let rpu = if !video.has_dv() || policy.dv_policy == DvPolicy::Drop {
                RpuHandling::Discard
            } else {
                match video.dv_profile() {
                    Some(7) => RpuHandling::ConvertAndReinject,
                    Some(8) => RpuHandling::Reinject,
                    other => {
                        let shown = other.map_or_else(|| "unknown".to_string(), |p| p.to_string());
                        diagnostics.push(Diagnostic::warn(format!(
                            "Dolby Vision profile {shown} cannot be re-injected after encoding; output will be HDR10 only"
                        )));
                        RpuHandling::Discard
                    }
                }
            };
            VideoStrategy::UnifiedEncode {
                rpu,
                carry_hdr10plus: video.hdr10plus && policy.hdr10plus_policy == Hdr10PlusPolicy::Keep,
            }
        }
        VideoMode::Encode => {
            if video.has_dynamic_metadata() {
                diagnostics.push(Diagnostic::warn(format!(
                    "Dynamic HDR metadata on a {} source cannot be carried through the encode and will be lost",
                    video.codec
                )));
            }
            VideoStrategy::SimpleEncode {
                static_metadata: !video.has_dynamic_metadata(),
            }
        }
    };

    (strategy, diagnostics)
}
