//! Intermediate file naming and output finalization.
//!
//! A [`Workspace`] names every temp artifact of one source file as
//! `<basename>_temp_<role>.<ext>` inside a work directory, where the basename
//! is the sanitized source stem plus a short hash of the full source path so
//! two sources with the same stem never share temp files.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Temp file namespace for one source file.
///
/// # Example
///
/// ```no_run
/// use mf_av::Workspace;
/// use std::path::Path;
///
/// let ws = Workspace::new(Path::new("/media/Movie.2020.mkv"), Path::new("/out"));
/// let raw = ws.temp_file("video_raw", "hevc");
/// // /out/Movie.2020_1a2b_temp_video_raw.hevc
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    work_dir: PathBuf,
    basename: String,
}

impl Workspace {
    /// Create the naming scheme for `source` with temp files in `work_dir`.
    pub fn new(source: &Path, work_dir: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());

        let digest = Sha256::digest(source.to_string_lossy().as_bytes());
        let short = hex::encode(&digest[..2]);

        Self {
            work_dir: work_dir.to_path_buf(),
            basename: format!("{}_{short}", sanitize_filename(&stem)),
        }
    }

    /// Prefix shared by every temp file of this source.
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Directory holding the temp files.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Path for a named temporary file.
    pub fn temp_file(&self, role: &str, ext: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}_temp_{role}.{ext}", self.basename))
    }

    /// Create the work directory if needed.
    pub fn prepare(&self) -> mf_core::Result<()> {
        std::fs::create_dir_all(&self.work_dir).map_err(|e| {
            mf_core::Error::filesystem(&self.work_dir, format!("failed to create work dir: {e}"))
        })
    }

    /// Move a finished staged output to its final location.
    ///
    /// Refuses to replace an existing file. Tries a rename first and falls
    /// back to copy + remove across filesystems.
    ///
    /// # Errors
    ///
    /// Returns [`mf_core::Error::Filesystem`] if the staged file is missing,
    /// the destination exists, or the move fails.
    pub fn finalize(&self, staged: &Path, dest: &Path) -> mf_core::Result<PathBuf> {
        if !staged.exists() {
            return Err(mf_core::Error::filesystem(staged, "staged output does not exist"));
        }
        if dest.exists() {
            return Err(mf_core::Error::filesystem(dest, "refusing to overwrite existing output"));
        }

        if let Err(_rename_err) = std::fs::rename(staged, dest) {
            std::fs::copy(staged, dest).map_err(|e| {
                mf_core::Error::filesystem(dest, format!("failed to copy output to destination: {e}"))
            })?;
            if let Err(e) = std::fs::remove_file(staged) {
                tracing::warn!("Could not remove staged output {}: {e}", staged.display());
            }
        }

        Ok(dest.to_path_buf())
    }
}

/// Reduce a name to a filesystem- and tool-safe ASCII form.
///
/// Keeps ASCII letters, digits, `_`, spaces and `._-[]()`. Everything else is
/// dropped; runs of whitespace collapse to one space.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || " ._-[]()".contains(*c))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "untitled".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn temp_names_share_hashed_basename() {
        let ws = Workspace::new(Path::new("/media/Movie.2020.mkv"), Path::new("/out"));
        assert!(ws.basename().starts_with("Movie.2020_"));
        assert_eq!(ws.basename().len(), "Movie.2020_".len() + 4);

        let raw = ws.temp_file("video_raw", "hevc");
        assert_eq!(raw.parent().unwrap(), Path::new("/out"));
        let name = raw.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_temp_video_raw.hevc"), "got {name}");
    }

    #[test]
    fn same_stem_different_dirs_do_not_collide() {
        let a = Workspace::new(Path::new("/a/movie.mkv"), Path::new("/out"));
        let b = Workspace::new(Path::new("/b/movie.mkv"), Path::new("/out"));
        assert_ne!(a.temp_file("x", "bin"), b.temp_file("x", "bin"));
    }

    #[test]
    fn sanitize_strips_unsafe_characters() {
        assert_eq!(sanitize_filename("Amélie: Le Film?"), "Amlie Le Film");
        assert_eq!(sanitize_filename("a  b\tc"), "a b c");
        assert_eq!(sanitize_filename("[Group] Show (2021)"), "[Group] Show (2021)");
        assert_eq!(sanitize_filename("???"), "untitled");
    }

    #[test]
    fn prepare_creates_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("nested/work");
        let ws = Workspace::new(Path::new("/m/movie.mkv"), &work);
        ws.prepare().unwrap();
        assert!(work.is_dir());
    }

    #[test]
    fn finalize_moves_staged_output() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(Path::new("/m/movie.mkv"), dir.path());
        let staged = ws.temp_file("output", "mkv");
        fs::write(&staged, b"muxed").unwrap();

        let dest = dir.path().join("Movie (2020).mkv");
        let final_path = ws.finalize(&staged, &dest).unwrap();
        assert_eq!(final_path, dest);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "muxed");
        assert!(!staged.exists());
    }

    #[test]
    fn finalize_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(Path::new("/m/movie.mkv"), dir.path());
        let staged = ws.temp_file("output", "mkv");
        fs::write(&staged, b"new").unwrap();
        let dest = dir.path().join("existing.mkv");
        fs::write(&dest, b"old").unwrap();

        assert!(ws.finalize(&staged, &dest).is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
    }

    #[test]
    fn finalize_fails_when_staged_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(Path::new("/m/movie.mkv"), dir.path());
        let result = ws.finalize(&ws.temp_file("output", "mkv"), &dir.path().join("o.mkv"));
        assert!(result.is_err());
    }
}
