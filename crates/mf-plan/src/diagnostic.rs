//! Planner diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
}

/// A message produced while planning, surfaced to the user before anything
/// runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

impl Diagnostic {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.level == Level::Warn
    }

    /// Emit through `tracing` at the matching level.
    pub fn log(&self) {
        match self.level {
            Level::Info => tracing::info!("{}", self.message),
            Level::Warn => tracing::warn!("{}", self.message),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Info => write!(f, "info: {}", self.message),
            Level::Warn => write!(f, "warning: {}", self.message),
        }
    }
}
