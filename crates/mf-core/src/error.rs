//! Unified error type for mkvforge.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. Planning
//! failures and failed tool invocations both carry enough identity (strategy
//! or step name) for the batch driver to report them per file.

use std::path::Path;

/// Unified error type covering all failure modes in mkvforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A plan could not be derived for the given catalog and policy.
    #[error("Planning error: {0}")]
    Planning(String),

    /// A planned operation ran and its tool reported failure.
    #[error("Operation failed [{step}] ({tool}): {message}")]
    Operation {
        /// Step name of the failing operation (e.g. "extract-rpu").
        step: String,
        /// Tool that was invoked.
        tool: String,
        /// Exit status and stderr tail.
        message: String,
    },

    /// An external tool could not be located, spawned or awaited.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// A filesystem precondition failed for a specific path.
    #[error("Filesystem error [{path}]: {message}")]
    Filesystem {
        /// The offending path.
        path: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was cancelled before it finished.
    #[error("Cancelled during {0}")]
    Cancelled(String),
}

impl Error {
    /// Convenience constructor for [`Error::Planning`].
    pub fn planning(message: impl Into<String>) -> Self {
        Error::Planning(message.into())
    }

    /// Convenience constructor for [`Error::Operation`].
    pub fn operation(
        step: impl Into<String>,
        tool: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Operation {
            step: step.into(),
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Filesystem`].
    pub fn filesystem(path: &Path, message: impl Into<String>) -> Self {
        Error::Filesystem {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Name of the step that failed, when the error is tied to one.
    pub fn step(&self) -> Option<&str> {
        match self {
            Error::Operation { step, .. } => Some(step),
            Error::Cancelled(step) => Some(step),
            _ => None,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
