//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external CLI
//! tools (ffmpeg, ffprobe, mkvmerge, mkvextract, dovi_tool, hdr10plus_tool)
//! and hands out preconfigured [`ToolCommand`]s for them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mf_core::config::ToolsConfig;
use mf_core::EncoderKind;
use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;

/// Known tool names that the registry manages.
pub const KNOWN_TOOLS: &[&str] = &[
    "ffmpeg",
    "ffprobe",
    "mkvmerge",
    "mkvextract",
    "dovi_tool",
    "hdr10plus_tool",
];

/// Tools that exit with status 1 when they finished with warnings only.
const WARNING_EXIT_TOOLS: &[&str] = &["mkvmerge", "mkvextract"];

/// A single resolved external tool.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    pub timeout: Option<Duration>,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of the version output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the [`ToolsConfig`] supplies a custom path
    /// **and** that path exists, it is used directly. Otherwise
    /// [`which::which`] is used to locate the tool in `PATH`. Tools that are
    /// not found are omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let timeout = tools_config.timeout_secs.map(Duration::from_secs);
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                "mkvmerge" => tools_config.mkvmerge_path.as_deref(),
                "mkvextract" => tools_config.mkvextract_path.as_deref(),
                "dovi_tool" => tools_config.dovi_tool_path.as_deref(),
                "hdr10plus_tool" => tools_config.hdr10plus_tool_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "Configured path for {name} does not exist ({}); searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            if let Some(path) = resolved {
                tracing::debug!("Found {name} at {}", path.display());
                registry.insert(name, path, timeout);
            }
        }

        registry
    }

    /// Register (or replace) a tool location.
    pub fn insert(&mut self, name: &str, path: PathBuf, timeout: Option<Duration>) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path,
                timeout,
            },
        );
    }

    /// Return the [`ToolConfig`] for the given tool, or an
    /// [`mf_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> mf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            mf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// A [`ToolCommand`] for the named tool with its timeout and accepted
    /// exit codes applied.
    pub fn command(&self, name: &str) -> mf_core::Result<ToolCommand> {
        let cfg = self.require(name)?;
        let mut cmd = ToolCommand::new(cfg.path.clone());
        if let Some(t) = cfg.timeout {
            cmd.timeout(t);
        }
        if WARNING_EXIT_TOOLS.contains(&name) {
            cmd.accept_exit_code(1);
        }
        Ok(cmd)
    }

    /// Names from `required` that were not found.
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| !self.tools.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }

    /// Hardware HEVC encoders compiled into the discovered ffmpeg, NVENC
    /// first.
    pub fn detect_encoders(&self) -> Vec<EncoderKind> {
        let Ok(ffmpeg) = self.require("ffmpeg") else {
            return Vec::new();
        };
        [EncoderKind::Nvenc, EncoderKind::Amf]
            .into_iter()
            .filter(|kind| encoder_supported(&ffmpeg.path, kind.ffmpeg_name()))
            .collect()
    }

    /// Iterate over all registered tool configs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ToolConfig)> {
        self.tools.iter()
    }
}

/// Run `ffmpeg -h encoder=<name>` and look for the encoder's help header.
fn encoder_supported(ffmpeg: &Path, encoder: &str) -> bool {
    let output = std::process::Command::new(ffmpeg)
        .args(["-hide_banner", "-h", &format!("encoder={encoder}")])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).contains(&format!("Encoder {encoder}"))
        }
        _ => false,
    }
}

/// Run the tool's version flag and return the first line of stdout.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };

    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
