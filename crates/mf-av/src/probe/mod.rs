//! Probe backends that shell out to CLI tools.

pub mod ffprobe;

pub use ffprobe::FfprobeProber;
