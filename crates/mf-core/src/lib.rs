//! mf-core: shared errors, media enums, conversion policy and configuration.
//!
//! This crate is the foundational dependency for all other mf-* crates.

pub mod config;
pub mod error;
pub mod media;
pub mod policy;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
pub use policy::*;
