//! Temp file removal.
//!
//! Two mechanisms share this module: per-operation release of temps whose
//! last reader has finished, and the final pass governed by
//! [`CleanupPolicy`]. Both are best effort; a file that cannot be removed is
//! logged and left behind.

use std::path::{Path, PathBuf};

use mf_core::config::CleanupConfig;
use mf_core::CleanupPolicy;

/// Cleanup behaviour for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSettings {
    /// Delete temps as soon as no later operation reads them.
    pub auto_cleanup: bool,
    pub final_policy: CleanupPolicy,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self::from(&CleanupConfig::default())
    }
}

impl From<&CleanupConfig> for CleanupSettings {
    fn from(cfg: &CleanupConfig) -> Self {
        Self {
            auto_cleanup: cfg.auto_cleanup_temp,
            final_policy: cfg.final_policy,
        }
    }
}

/// Asks whether leftover temps should be deleted.
pub trait CleanupPrompt: Send + Sync {
    /// `succeeded` reports how the run ended; `files` are the temps still on
    /// disk.
    fn confirm(&self, succeeded: bool, files: &[PathBuf]) -> bool;
}

/// Answers "no" to every prompt. Used when nobody is there to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepFiles;

impl CleanupPrompt for KeepFiles {
    fn confirm(&self, _succeeded: bool, _files: &[PathBuf]) -> bool {
        false
    }
}

/// Whether the final pass deletes leftovers.
pub fn should_clean(
    policy: CleanupPolicy,
    succeeded: bool,
    prompt: &dyn CleanupPrompt,
    files: &[PathBuf],
) -> bool {
    match policy {
        CleanupPolicy::Always => true,
        CleanupPolicy::OnSuccess => succeeded,
        CleanupPolicy::Never => false,
        CleanupPolicy::Ask => prompt.confirm(succeeded, files),
    }
}

/// Remove each existing file. Returns how many were removed.
pub async fn remove_files(files: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in files {
        if remove_file(path).await {
            removed += 1;
        }
    }
    removed
}

async fn remove_file(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Could not remove temp file {}: {e}", path.display());
            false
        }
    }
}

/// Final pass: apply `settings.final_policy` to whichever of `temps` still
/// exist.
pub async fn final_pass(
    settings: &CleanupSettings,
    succeeded: bool,
    prompt: &dyn CleanupPrompt,
    temps: &[PathBuf],
) {
    let leftovers: Vec<PathBuf> = temps.iter().filter(|p| p.exists()).cloned().collect();
    if leftovers.is_empty() {
        return;
    }

    if should_clean(settings.final_policy, succeeded, prompt, &leftovers) {
        let removed = remove_files(&leftovers).await;
        tracing::info!("Cleaned up {removed} temp file(s)");
    } else {
        tracing::info!(
            "Keeping {} temp file(s) (cleanup policy: {})",
            leftovers.len(),
            settings.final_policy
        );
        for path in &leftovers {
            tracing::debug!("Kept {}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Answer {
        yes: bool,
        asked: AtomicUsize,
    }

    impl CleanupPrompt for Answer {
        fn confirm(&self, _succeeded: bool, _files: &[PathBuf]) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.yes
        }
    }

    #[test]
    fn policy_table() {
        let keep = KeepFiles;
        for succeeded in [true, false] {
            assert!(should_clean(CleanupPolicy::Always, succeeded, &keep, &[]));
            assert!(!should_clean(CleanupPolicy::Never, succeeded, &keep, &[]));
            assert_eq!(should_clean(CleanupPolicy::OnSuccess, succeeded, &keep, &[]), succeeded);
        }
    }

    #[test]
    fn ask_defers_to_prompt() {
        let yes = Answer { yes: true, asked: AtomicUsize::new(0) };
        assert!(should_clean(CleanupPolicy::Ask, false, &yes, &[]));
        assert!(!should_clean(CleanupPolicy::Ask, true, &KeepFiles, &[]));
        assert!(!should_clean(CleanupPolicy::Never, true, &yes, &[]));
        assert_eq!(yes.asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn remove_files_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.hevc");
        std::fs::write(&present, b"x").unwrap();
        let missing = dir.path().join("b.hevc");

        assert_eq!(remove_files(&[present.clone(), missing]).await, 1);
        assert!(!present.exists());
    }

    #[tokio::test]
    async fn final_pass_does_not_prompt_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Answer { yes: true, asked: AtomicUsize::new(0) };
        let settings = CleanupSettings {
            auto_cleanup: true,
            final_policy: CleanupPolicy::Ask,
        };
        final_pass(&settings, true, &prompt, &[dir.path().join("gone.bin")]).await;
        assert_eq!(prompt.asked.load(Ordering::SeqCst), 0);
    }
}
