//! Configuration loading.
//!
//! The types live in [`mf_core::config`]; this module finds and parses the
//! TOML file and runs validation.

pub use mf_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Locations searched when no `--config` is given, in order.
pub const DEFAULT_PATHS: &[&str] = &["./mkvforge.toml", "~/.config/mkvforge/config.toml"];

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse and validate TOML text. Validation warnings are logged.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content).context("Failed to parse config")?;
    expand_paths(&mut config);

    for warning in config.validate()? {
        tracing::warn!("{warning}");
    }
    Ok(config)
}

/// Load config from the given path, else the first default location that
/// exists, else built-in defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Expand `~` in every configured path.
fn expand_paths(config: &mut Config) {
    let tools = &mut config.tools;
    for slot in [
        &mut tools.ffmpeg_path,
        &mut tools.ffprobe_path,
        &mut tools.mkvmerge_path,
        &mut tools.mkvextract_path,
        &mut tools.dovi_tool_path,
        &mut tools.hdr10plus_tool_path,
        &mut config.output.directory,
        &mut config.output.work_dir,
        &mut config.logging.file,
    ] {
        if let Some(path) = slot.as_mut() {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            *path = expanded.into();
        }
    }
}
