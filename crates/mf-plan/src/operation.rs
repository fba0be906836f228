//! A single planned tool invocation.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Small file whose content is fixed at planning time and written by the
/// executor right before the owning operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// One external tool invocation.
///
/// `inputs` and `outputs` list every file the invocation reads or writes
/// (staged files count as inputs); the executor uses them for cleanup and
/// skip decisions, never for building the command line.
///
/// # Example
///
/// ```
/// use mf_plan::Operation;
/// use std::path::Path;
///
/// let src = Path::new("/media/movie.mkv");
/// let raw = Path::new("/work/movie_temp_video_raw.hevc");
/// let op = Operation::new("extract-raw", "mkvextract")
///     .arg("tracks")
///     .path_arg(src)
///     .arg(format!("0:{}", raw.display()))
///     .reads(src)
///     .writes(raw);
/// assert_eq!(op.outputs, vec![raw.to_path_buf()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    /// Step name, unique within a plan (e.g. "inject-rpu").
    pub step: String,
    /// Tool name as known to the tool registry.
    pub tool: String,
    pub args: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub staged: Vec<StagedFile>,
}

impl Operation {
    pub fn new(step: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            tool: tool.into(),
            args: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            staged: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// `flag path` pair for a file this operation reads.
    pub fn input_flag(self, flag: &str, path: &Path) -> Self {
        self.arg(flag).path_arg(path).reads(path)
    }

    /// `flag path` pair for a file this operation writes.
    pub fn output_flag(self, flag: &str, path: &Path) -> Self {
        self.arg(flag).path_arg(path).writes(path)
    }

    pub fn reads(mut self, path: &Path) -> Self {
        if !self.inputs.iter().any(|p| p == path) {
            self.inputs.push(path.to_path_buf());
        }
        self
    }

    pub fn writes(mut self, path: &Path) -> Self {
        if !self.outputs.iter().any(|p| p == path) {
            self.outputs.push(path.to_path_buf());
        }
        self
    }

    /// Attach a staged file. It is also recorded as an input.
    pub fn stage(mut self, path: &Path, contents: impl Into<String>) -> Self {
        self.staged.push(StagedFile {
            path: path.to_path_buf(),
            contents: contents.into(),
        });
        self.reads(path)
    }

    /// Every path this operation touches.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// The command line with the bare tool name, for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.tool.clone())
            .chain(self.args.iter().map(|a| {
                if a.contains(' ') {
                    format!("\"{a}\"")
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_record_files() {
        let op = Operation::new("inject-rpu", "dovi_tool")
            .arg("inject-rpu")
            .input_flag("-i", Path::new("/w/enc.hevc"))
            .input_flag("-r", Path::new("/w/rpu.bin"))
            .output_flag("-o", Path::new("/w/final.hevc"));

        assert_eq!(
            op.args,
            vec!["inject-rpu", "-i", "/w/enc.hevc", "-r", "/w/rpu.bin", "-o", "/w/final.hevc"]
        );
        assert_eq!(op.inputs.len(), 2);
        assert_eq!(op.outputs, vec![PathBuf::from("/w/final.hevc")]);
        assert_eq!(op.files().count(), 3);
    }

    #[test]
    fn staged_files_are_inputs() {
        let op = Operation::new("convert-rpu", "dovi_tool").stage(Path::new("/w/editor.json"), "{\"mode\":2}");
        assert_eq!(op.inputs, vec![PathBuf::from("/w/editor.json")]);
        assert_eq!(op.staged[0].contents, "{\"mode\":2}");
    }

    #[test]
    fn command_line_quotes_spaces() {
        let op = Operation::new("mux", "mkvmerge")
            .arg("-o")
            .path_arg(Path::new("/out/My Movie.mkv"));
        assert_eq!(op.command_line(), "mkvmerge -o \"/out/My Movie.mkv\"");
    }
}
