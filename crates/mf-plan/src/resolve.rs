//! Policy resolution against the probed video stream.
//!
//! Dolby Vision Profile 5 uses the IPT-PQ-C2 colour space; its base layer is
//! not viewable without the RPU. Re-encoding it, stripping the RPU or
//! attempting a profile conversion all produce unwatchable colours, so any
//! such request is replaced by a plain passthrough.

use mf_core::{ConversionPolicy, DvPolicy, VideoMode};
use mf_probe::VideoStreamInfo;
use serde::Serialize;

use crate::diagnostic::Diagnostic;

/// The policy that will actually drive planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub policy: ConversionPolicy,
    /// The request was replaced to protect a Profile 5 source.
    pub safety_override: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve `requested` against `video`. Never fails.
pub fn resolve(requested: &ConversionPolicy, video: &VideoStreamInfo) -> Resolution {
    let mut policy = requested.clone();
    let mut diagnostics = Vec::new();

    match video.dv_profile() {
        Some(5) => {
            diagnostics.push(Diagnostic::warn(
                "Dolby Vision Profile 5 source: players without DV support will show wrong colours",
            ));

            let unsafe_request = policy.video_mode == VideoMode::Encode
                || matches!(policy.dv_policy, DvPolicy::Drop | DvPolicy::Convert7To8);

            if unsafe_request {
                diagnostics.push(Diagnostic::warn(format!(
                    "Profile 5 cannot be re-encoded or stripped; overriding {} / dv {} with passthrough / dv keep",
                    requested.video_mode, requested.dv_policy
                )));
                policy = ConversionPolicy {
                    hdr10plus_policy: requested.hdr10plus_policy,
                    ..ConversionPolicy::passthrough()
                };
                return Resolution {
                    policy,
                    safety_override: true,
                    diagnostics,
                };
            }
        }
        Some(8) if policy.dv_policy == DvPolicy::Convert7To8 => {
            diagnostics.push(Diagnostic::info(
                "Source is already Dolby Vision Profile 8; dv_policy convert7_to_8 treated as keep",
            ));
            policy.dv_policy = DvPolicy::Keep;
        }
        _ => {}
    }

    Resolution {
        policy,
        safety_override: false,
        diagnostics,
    }
}
