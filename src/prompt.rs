//! Interactive cleanup confirmation for `cleanup.final = "ask"`.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use mf_pipeline::CleanupPrompt;

/// Asks on the terminal. The default answer is "yes" after a successful run
/// and "no" after a failure; it is also what a non-interactive stdin gets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl CleanupPrompt for TerminalPrompt {
    fn confirm(&self, succeeded: bool, files: &[PathBuf]) -> bool {
        let default = succeeded;
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return default;
        }

        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{} temp file(s) remain:", files.len());
        for f in files.iter().take(10) {
            let _ = writeln!(err, "  {}", f.display());
        }
        if files.len() > 10 {
            let _ = writeln!(err, "  ... and {} more", files.len() - 10);
        }
        let _ = write!(err, "Delete them? [{}] ", if default { "Y/n" } else { "y/N" });
        let _ = err.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(_) => parse_answer(&line, default),
            Err(_) => default,
        }
    }
}

fn parse_answer(line: &str, default: bool) -> bool {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert!(parse_answer("\n", true));
        assert!(!parse_answer("", false));
        assert!(parse_answer("Y\n", false));
        assert!(parse_answer(" yes ", false));
        assert!(!parse_answer("n", true));
        assert!(!parse_answer("whatever", true));
    }
}
