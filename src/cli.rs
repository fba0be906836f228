use clap::{Args, Parser, Subcommand, ValueEnum};
use mf_core::config::Config;
use mf_core::{DvPolicy, Hdr10PlusPolicy, TrackKind, VideoMode};
use mf_plan::ExternalTrack;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mkvforge")]
#[command(author, version, about = "Repackage video into MKV, keeping Dolby Vision and HDR10+ intact")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a single file
    Run {
        /// Input file to process
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        opts: RunOptions,
    },

    /// Process every video file under a directory
    Batch {
        /// Directory to scan recursively
        #[arg(required = true)]
        dir: PathBuf,

        #[command(flatten)]
        opts: RunOptions,
    },

    /// Print the plan for a file as JSON without running anything
    Plan {
        /// Input file to plan
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        opts: RunOptions,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Options shared by `run`, `batch` and `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Output directory (default: next to the source)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log the commands without executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Override the configured video mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Override the configured Dolby Vision policy
    #[arg(long, value_enum)]
    pub dv_policy: Option<DvPolicyArg>,

    /// Override the configured HDR10+ policy
    #[arg(long, value_enum)]
    pub hdr10plus_policy: Option<Hdr10PlusArg>,

    /// Extra audio file to mux, as LANG=PATH (repeatable)
    #[arg(long = "add-audio", value_name = "LANG=PATH", value_parser = parse_lang_path)]
    pub add_audio: Vec<(String, PathBuf)>,

    /// Extra subtitle file to mux, as LANG=PATH (repeatable)
    #[arg(long = "add-subtitle", value_name = "LANG=PATH", value_parser = parse_lang_path)]
    pub add_subtitle: Vec<(String, PathBuf)>,
}

impl RunOptions {
    /// Apply the policy overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.video.mode = mode.into();
        }
        if let Some(dv) = self.dv_policy {
            config.video.dv_policy = dv.into();
        }
        if let Some(hdr) = self.hdr10plus_policy {
            config.video.hdr10plus_policy = hdr.into();
        }
    }

    /// The `--add-audio` and `--add-subtitle` files.
    pub fn external_tracks(&self) -> Vec<ExternalTrack> {
        let audio = self.add_audio.iter().map(|t| (TrackKind::Audio, t));
        let subs = self.add_subtitle.iter().map(|t| (TrackKind::Subtitle, t));
        audio
            .chain(subs)
            .map(|(kind, (language, path))| ExternalTrack {
                kind,
                path: path.clone(),
                language: language.clone(),
                title: None,
            })
            .collect()
    }
}

fn parse_lang_path(s: &str) -> Result<(String, PathBuf), String> {
    let (lang, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LANG=PATH, got '{s}'"))?;
    if lang.is_empty() || path.is_empty() {
        return Err(format!("expected LANG=PATH, got '{s}'"));
    }
    Ok((lang.to_string(), PathBuf::from(path)))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Passthrough,
    Encode,
}

impl From<ModeArg> for VideoMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Passthrough => VideoMode::Passthrough,
            ModeArg::Encode => VideoMode::Encode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DvPolicyArg {
    Keep,
    Drop,
    #[value(name = "convert7_to_8")]
    Convert7To8,
}

impl From<DvPolicyArg> for DvPolicy {
    fn from(p: DvPolicyArg) -> Self {
        match p {
            DvPolicyArg::Keep => DvPolicy::Keep,
            DvPolicyArg::Drop => DvPolicy::Drop,
            DvPolicyArg::Convert7To8 => DvPolicy::Convert7To8,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Hdr10PlusArg {
    Keep,
    Drop,
}

impl From<Hdr10PlusArg> for Hdr10PlusPolicy {
    fn from(p: Hdr10PlusArg) -> Self {
        match p {
            Hdr10PlusArg::Keep => Hdr10PlusPolicy::Keep,
            Hdr10PlusArg::Drop => Hdr10PlusPolicy::Drop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_and_external_tracks() {
        let cli = Cli::try_parse_from([
            "mkvforge",
            "run",
            "movie.mkv",
            "--mode",
            "encode",
            "--dv-policy",
            "convert7_to_8",
            "--add-audio",
            "ger=/extra/dub.ac3",
            "--add-subtitle",
            "eng=/extra/forced.srt",
        ])
        .unwrap();
        let Commands::Run { opts, .. } = cli.command else {
            panic!("expected run");
        };

        let mut config = Config::default();
        opts.apply(&mut config);
        assert_eq!(config.video.mode, VideoMode::Encode);
        assert_eq!(config.video.dv_policy, DvPolicy::Convert7To8);
        assert_eq!(config.video.hdr10plus_policy, Hdr10PlusPolicy::Keep);

        let ext = opts.external_tracks();
        assert_eq!(ext.len(), 2);
        assert_eq!(ext[0].kind, TrackKind::Audio);
        assert_eq!(ext[0].language, "ger");
        assert_eq!(ext[1].path, PathBuf::from("/extra/forced.srt"));
    }

    #[test]
    fn malformed_external_track_is_rejected() {
        assert!(Cli::try_parse_from(["mkvforge", "run", "a.mkv", "--add-audio", "nolang"]).is_err());
        assert!(Cli::try_parse_from(["mkvforge", "run", "a.mkv", "--add-audio", "=x.ac3"]).is_err());
    }
}
