//! The [`Prober`] trait defining the interface for source file probing.

use std::path::Path;

use async_trait::async_trait;

use crate::types::StreamCatalog;

/// A prober capable of building a [`StreamCatalog`] for a source file.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe the file and describe its streams.
    ///
    /// Fails with [`mf_core::Error::Probe`] when the file has no video stream
    /// or the probe output cannot be interpreted.
    async fn probe(&self, path: &Path) -> mf_core::Result<StreamCatalog>;

    /// Check whether this prober handles the given file path.
    ///
    /// A return value of `true` does not guarantee that [`Prober::probe`]
    /// will succeed.
    fn supports(&self, path: &Path) -> bool;
}
