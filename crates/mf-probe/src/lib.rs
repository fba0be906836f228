//! # mf-probe
//!
//! The stream catalog produced by probing a source file, and the [`Prober`]
//! trait that probe backends implement.
//!
//! The catalog is an immutable snapshot: the planner reads it, nothing writes
//! it after the probe returns.

pub mod prober;
pub mod types;

// Re-export key types at crate root for convenience.
pub use prober::Prober;
pub use types::{
    parse_rational, ContentLightLevel, DvInfo, MasteringDisplay, MediaTrack, StreamCatalog,
    VideoStreamInfo,
};
