//! Finding source files for batch runs.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Extensions treated as video sources.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "m2ts", "ts", "mov", "webm"];

/// Marker in every intermediate file name; such files are never sources.
const TEMP_MARKER: &str = "_temp_";

pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)))
}

/// Every video file under `dir`, sorted by path. Leftover temps and
/// anything under `skip_dir` (typically the output directory) are ignored.
pub fn discover(dir: &Path, skip_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_video_file(p))
        .filter(|p| {
            !p.file_name()
                .is_some_and(|n| n.to_string_lossy().contains(TEMP_MARKER))
        })
        .filter(|p| skip_dir.map_or(true, |skip| skip == dir || !p.starts_with(skip)))
        .collect();
    found.sort();
    tracing::debug!("Found {} video file(s) under {}", found.len(), dir.display());
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn extensions() {
        assert!(is_video_file(Path::new("a.MKV")));
        assert!(is_video_file(Path::new("/x/b.m2ts")));
        assert!(!is_video_file(Path::new("c.srt")));
        assert!(!is_video_file(Path::new("noext")));
    }

    #[test]
    fn walks_recursively_and_skips_temps_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("season/extras")).unwrap();
        fs::create_dir_all(root.join("out")).unwrap();
        for name in [
            "b.mkv",
            "a.mp4",
            "notes.txt",
            "season/extras/c.webm",
            "b_1a2b_temp_video_raw.mkv",
            "out/done.mkv",
        ] {
            fs::write(root.join(name), b"").unwrap();
        }

        let found = discover(root, Some(&root.join("out")));
        let rel: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.mp4", "b.mkv", "season/extras/c.webm"]);
    }

    #[test]
    fn output_dir_equal_to_input_is_not_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mkv"), b"").unwrap();
        assert_eq!(discover(dir.path(), Some(dir.path())).len(), 1);
    }
}
