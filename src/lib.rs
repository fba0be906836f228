//! mkvforge - MKV repackaging with Dolby Vision and HDR10+ aware pipelines.
//!
//! This library crate exposes the binary's building blocks for integration
//! testing.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod logging;
pub mod prompt;
