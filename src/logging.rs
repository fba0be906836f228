//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const CRATES: &[&str] = &["mkvforge", "mf_core", "mf_probe", "mf_av", "mf_plan", "mf_pipeline"];

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|c| format!("{c}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber: stderr always, plus `log_file` (appended,
/// no ANSI colours) when given.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    // Respect RUST_LOG if set.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(verbose));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_every_crate() {
        let filter = default_filter(true);
        assert!(filter.starts_with("mkvforge=debug,"));
        assert!(filter.contains("mf_pipeline=debug"));
        assert!(default_filter(false).contains("mf_plan=info"));
    }
}
