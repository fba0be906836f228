//! # mf-av
//!
//! External tool plumbing for the mkvforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe, mkvmerge, mkvextract, dovi_tool and hdr10plus_tool, and detect
//!   hardware HEVC encoders.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   timeout, accepted warning exit codes and kill-on-drop.
//! - **Workspace naming** ([`Workspace`]) -- per-source temp file names and
//!   safe output finalization.
//! - **Probe backend** ([`probe::FfprobeProber`]) -- implements
//!   [`mf_probe::Prober`] by shelling out to ffprobe.

pub mod command;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use probe::FfprobeProber;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, KNOWN_TOOLS};
pub use workspace::{sanitize_filename, Workspace};
