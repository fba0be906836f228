//! # mf-plan
//!
//! Pure planning for one source file: everything between the probe result
//! and the first tool invocation.
//!
//! - **[`resolve()`]** -- applies the Dolby Vision Profile 5 safety override
//!   and normalizes the requested [`ConversionPolicy`](mf_core::ConversionPolicy).
//! - **[`select()`]** -- picks one [`VideoStrategy`] from the resolved policy
//!   and the video stream.
//! - **[`build_video()`]** -- expands a strategy into an ordered chain of
//!   [`Operation`]s ending in a [`VideoResult`].
//! - **[`select_tracks()`]**, **[`build_mux()`]**, **[`TagSet`]** and
//!   **[`output_name()`]** -- audio/subtitle selection, the final mkvmerge
//!   invocation, global tags and Plex-friendly naming.
//! - **[`plan_file()`]** -- ties it all together into a [`FilePlan`].
//!
//! Nothing in this crate touches the filesystem or spawns a process.

pub mod build;
pub mod diagnostic;
pub mod mux;
pub mod naming;
pub mod operation;
pub mod plan;
pub mod resolve;
pub mod strategy;
pub mod tags;
pub mod tracks;

#[cfg(test)]
pub(crate) mod fixtures;

pub use build::{build_video, encoder_args, ContainerKind, VideoPipeline, VideoResult};
pub use diagnostic::{Diagnostic, Level};
pub use mux::{build_mux, MuxInput, MuxTrack};
pub use naming::{output_name, resolve_collision, OutputTarget};
pub use operation::{Operation, StagedFile};
pub use plan::{plan_file, FilePlan, PlanInput};
pub use resolve::{resolve, Resolution};
pub use strategy::{select, DvTransform, RpuHandling, VideoStrategy};
pub use tags::TagSet;
pub use tracks::{select_tracks, ExternalTrack, TrackSelection};
