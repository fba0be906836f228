//! The final mkvmerge invocation.

use std::path::{Path, PathBuf};

use mf_core::TrackKind;
use serde::Serialize;

use crate::build::{ContainerKind, VideoResult};
use crate::operation::Operation;

/// An audio or subtitle file going into the mux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MuxTrack {
    pub kind: TrackKind,
    pub path: PathBuf,
    pub language: String,
    pub title: String,
    pub default: bool,
}

/// Everything the mux step needs.
#[derive(Debug, Clone)]
pub struct MuxInput<'a> {
    pub video: &'a VideoResult,
    /// Frame rate of a raw elementary stream as a rational string.
    pub frame_rate: Option<&'a str>,
    /// Staged global-tags XML: path and contents.
    pub tags: Option<(&'a Path, String)>,
    /// Audio tracks then subtitle tracks, in output order.
    pub tracks: &'a [MuxTrack],
    /// Where mkvmerge writes; moved into place after a successful run.
    pub output: &'a Path,
}

/// Build the `mkvmerge -o <output> ...` operation.
pub fn build_mux(input: &MuxInput<'_>) -> Operation {
    let video = input.video;
    let sel = &video.track_selector;

    let mut op = Operation::new("mux", "mkvmerge").output_flag("-o", input.output);

    op = match video.kind {
        ContainerKind::Container => op
            .args(["--video-tracks", sel.as_str(), "-A", "-S", "--no-chapters", "--no-attachments"])
            .path_arg(&video.path)
            .reads(&video.path),
        ContainerKind::RawElementary => {
            op = op.args(["--language".to_string(), format!("{sel}:und")]);
            if let Some(rate) = input.frame_rate.filter(|r| mf_probe::parse_rational(r).is_some_and(|f| f > 0.0)) {
                op = op.args(["--default-duration".to_string(), format!("{sel}:{rate}p")]);
            }
            op.path_arg(&video.path).reads(&video.path)
        }
    };

    if let Some((path, contents)) = &input.tags {
        op = op.arg("--global-tags").path_arg(path).stage(path, contents.clone());
    }

    for track in input.tracks {
        let default = if track.default { "yes" } else { "no" };
        op = op
            .args([
                "--language".to_string(),
                format!("0:{}", track.language),
                "--track-name".to_string(),
                format!("0:{}", track.title),
                "--default-track".to_string(),
                format!("0:{default}"),
            ])
            .path_arg(&track.path)
            .reads(&track.path);
    }

    op
}
