//! Builder for executing external tool commands.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Number of output lines kept in error and warning messages.
const TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is killed when the returned future is dropped, so racing
/// [`ToolCommand::execute`] against a cancellation token stops the tool.
///
/// # Example
///
/// ```no_run
/// use mf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("mkvextract"))
///     .arg("tracks")
///     .arg("/path/to/movie.mkv")
///     .arg("0:/tmp/movie_temp_video_raw.hevc")
///     .accept_exit_code(1)
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    ok_exit_codes: Vec<i32>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
            ok_exit_codes: vec![0],
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time. Without one the command may run
    /// indefinitely.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Treat an additional exit code as success (mkvtoolnix exits 1 on
    /// warnings).
    pub fn accept_exit_code(&mut self, code: i32) -> &mut Self {
        if !self.ok_exit_codes.contains(&code) {
            self.ok_exit_codes.push(code);
        }
        self
    }

    /// Short program name used in logs and errors.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Render the command line for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .map(|a| shell_quote(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`mf_core::Error::Tool`] if spawning the process fails.
    /// - Returns [`mf_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`mf_core::Error::Tool`] if the process exits with a code
    ///   that was not accepted (message includes the output tail).
    pub async fn execute(&self) -> mf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| mf_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_elapsed| {
                    mf_core::Error::tool(&program_name, format!("timed out after {limit:?}"))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            mf_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        let accepted = output
            .status
            .code()
            .is_some_and(|c| self.ok_exit_codes.contains(&c));

        if !accepted {
            // mkvtoolnix reports errors on stdout.
            let detail = if tool_output.stderr.trim().is_empty() {
                &tool_output.stdout
            } else {
                &tool_output.stderr
            };
            return Err(mf_core::Error::tool(
                program_name,
                format!("exited with {}: {}", output.status, output_tail(detail)),
            ));
        }

        if output.status.code() != Some(0) {
            tracing::warn!(
                "{program_name} finished with warnings ({}): {}",
                output.status,
                output_tail(&tool_output.stdout)
            );
        }

        Ok(tool_output)
    }
}

fn output_tail(text: &str) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,%@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
