//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from TOML by the binary and carries
//! tool overrides, the requested conversion policy, track selection rules and
//! cleanup settings. Every section defaults sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::policy::{
    AmfQuality, CleanupPolicy, ConversionPolicy, DvPolicy, EncoderKind, EncoderSettings,
    Hdr10PlusPolicy, VideoMode,
};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub video: VideoConfig,
    pub audio: TrackSelectionConfig,
    pub subtitles: TrackSelectionConfig,
    pub cleanup: CleanupConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            video: VideoConfig::default(),
            audio: TrackSelectionConfig::default(),
            subtitles: TrackSelectionConfig {
                policy: SelectionPolicy::All,
                default_mode: DefaultMode::None,
                ..TrackSelectionConfig::default()
            },
            cleanup: CleanupConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Check the configuration.
    ///
    /// Encoder parameters outside what the encoders accept are hard errors;
    /// everything else that looks suspicious is returned as a warning.
    pub fn validate(&self) -> Result<Vec<String>> {
        self.video.nvenc.settings().validate()?;
        self.video.amf.settings().validate()?;

        let mut warnings = Vec::new();

        if self.video.mode == VideoMode::Passthrough && self.video.encoder != EncoderChoice::Auto {
            warnings.push(format!(
                "video.encoder '{}' is ignored in passthrough mode",
                self.video.encoder
            ));
        }

        for (section, sel) in [("audio", &self.audio), ("subtitles", &self.subtitles)] {
            if let LanguageFilter::Only(langs) = &sel.languages {
                if langs.is_empty() && sel.policy == SelectionPolicy::BestPerLanguage {
                    warnings.push(format!(
                        "{section}.languages is empty; no {section} tracks will be selected"
                    ));
                }
                if let Some(ref default) = sel.default_language {
                    if !langs.iter().any(|l| l == default) {
                        warnings.push(format!(
                            "{section}.default_language '{default}' is not in {section}.languages"
                        ));
                    }
                }
            }
        }

        if let Some(ref dir) = self.output.directory {
            if !dir.exists() {
                warnings.push(format!(
                    "output.directory {} does not exist yet; it will be created",
                    dir.display()
                ));
            }
        }

        Ok(warnings)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Overrides for external tool locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub mkvmerge_path: Option<PathBuf>,
    pub mkvextract_path: Option<PathBuf>,
    pub dovi_tool_path: Option<PathBuf>,
    pub hdr10plus_tool_path: Option<PathBuf>,
    /// Upper bound for a single pipeline operation. Unlimited when unset.
    pub timeout_secs: Option<u64>,
}

/// Which hardware encoder to use when encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderChoice {
    /// First detected encoder, NVENC before AMF.
    #[default]
    Auto,
    Nvenc,
    Amf,
}

impl std::fmt::Display for EncoderChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Nvenc => write!(f, "nvenc"),
            Self::Amf => write!(f, "amf"),
        }
    }
}

/// Requested video handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub mode: VideoMode,
    pub dv_policy: DvPolicy,
    pub hdr10plus_policy: Hdr10PlusPolicy,
    pub encoder: EncoderChoice,
    pub nvenc: NvencConfig,
    pub amf: AmfConfig,
}

impl VideoConfig {
    /// Build the requested policy.
    ///
    /// `detected` is the encoder found on this machine; it is consulted only
    /// when `encoder = "auto"`. An encode request with no usable encoder keeps
    /// `encoder: None`; the planner rejects it unless a safety override turns
    /// the run into passthrough.
    pub fn requested_policy(&self, detected: Option<EncoderKind>) -> ConversionPolicy {
        let encoder = match self.mode {
            VideoMode::Passthrough => None,
            VideoMode::Encode => {
                let kind = match self.encoder {
                    EncoderChoice::Auto => detected,
                    EncoderChoice::Nvenc => Some(EncoderKind::Nvenc),
                    EncoderChoice::Amf => Some(EncoderKind::Amf),
                };
                kind.map(|k| match k {
                    EncoderKind::Nvenc => self.nvenc.settings(),
                    EncoderKind::Amf => self.amf.settings(),
                })
            }
        };

        ConversionPolicy {
            video_mode: self.mode,
            dv_policy: self.dv_policy,
            hdr10plus_policy: self.hdr10plus_policy,
            encoder,
        }
    }
}

/// NVENC parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NvencConfig {
    pub preset: String,
    pub cq: u8,
}

impl Default for NvencConfig {
    fn default() -> Self {
        Self {
            preset: "p7".into(),
            cq: 19,
        }
    }
}

impl NvencConfig {
    pub fn settings(&self) -> EncoderSettings {
        EncoderSettings::Nvenc {
            preset: self.preset.clone(),
            cq: self.cq,
        }
    }
}

/// AMF parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmfConfig {
    pub quality: AmfQuality,
    pub qp: u8,
}

impl Default for AmfConfig {
    fn default() -> Self {
        Self {
            quality: AmfQuality::Quality,
            qp: 20,
        }
    }
}

impl AmfConfig {
    pub fn settings(&self) -> EncoderSettings {
        EncoderSettings::Amf {
            quality: self.quality,
            qp: self.qp,
        }
    }
}

/// How candidate tracks are narrowed down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// One track per language, chosen by codec preference.
    #[default]
    BestPerLanguage,
    /// Every track in source order.
    All,
}

/// How a default subtitle track is chosen when no language rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultMode {
    /// The first selected track becomes default.
    #[default]
    First,
    /// No track is flagged default.
    None,
}

/// Language filter: the keyword `"all"` or an ordered list of language tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLanguages", into = "RawLanguages")]
pub enum LanguageFilter {
    #[default]
    All,
    Only(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawLanguages {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<RawLanguages> for LanguageFilter {
    type Error = String;

    fn try_from(raw: RawLanguages) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawLanguages::Keyword(k) if k.eq_ignore_ascii_case("all") => Ok(LanguageFilter::All),
            RawLanguages::Keyword(k) => Err(format!(
                "languages must be \"all\" or a list of language tags, got \"{k}\""
            )),
            RawLanguages::List(list) => Ok(LanguageFilter::Only(list)),
        }
    }
}

impl From<LanguageFilter> for RawLanguages {
    fn from(filter: LanguageFilter) -> Self {
        match filter {
            LanguageFilter::All => RawLanguages::Keyword("all".into()),
            LanguageFilter::Only(list) => RawLanguages::List(list),
        }
    }
}

/// Track selection rules for one track kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSelectionConfig {
    pub policy: SelectionPolicy,
    pub languages: LanguageFilter,
    /// Codec names in descending preference.
    pub preferred_codecs: Vec<String>,
    /// Case-insensitive title fragments that disqualify a track.
    pub exclude_titles_containing: Vec<String>,
    pub default_language: Option<String>,
    pub default_mode: DefaultMode,
}

impl Default for TrackSelectionConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::BestPerLanguage,
            languages: LanguageFilter::All,
            preferred_codecs: Vec::new(),
            exclude_titles_containing: vec!["commentary".into()],
            default_language: None,
            default_mode: DefaultMode::First,
        }
    }
}

/// Temp file handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Delete each temp file as soon as its last consumer has run.
    pub auto_cleanup_temp: bool,
    /// Policy for the final bulk pass.
    #[serde(rename = "final")]
    pub final_policy: CleanupPolicy,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_cleanup_temp: true,
            final_policy: CleanupPolicy::OnSuccess,
        }
    }
}

/// What to do when the planned output file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Leave the existing file alone and report the run as skipped.
    #[default]
    Skip,
    /// Pick a free name by appending ` (n)`.
    Rename,
}

/// Output location and naming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory. Defaults to the source file's directory.
    pub directory: Option<PathBuf>,
    /// Directory for intermediate files. Defaults to the output directory.
    pub work_dir: Option<PathBuf>,
    pub on_collision: CollisionPolicy,
}

/// Logging settings beyond `RUST_LOG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to this file.
    pub file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        let warnings = cfg.validate().unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        assert!(cfg.cleanup.auto_cleanup_temp);
        assert_eq!(cfg.cleanup.final_policy, CleanupPolicy::OnSuccess);
        assert_eq!(cfg.output.on_collision, CollisionPolicy::Skip);
        assert_eq!(cfg.subtitles.policy, SelectionPolicy::All);
        assert_eq!(cfg.subtitles.default_mode, DefaultMode::None);
    }

    #[test]
    fn invalid_encoder_params_are_errors() {
        let mut cfg = Config::default();
        cfg.video.nvenc.cq = 55;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("nvenc cq 55"), "got: {err}");
    }

    #[test]
    fn language_filter_from_json() {
        let all: LanguageFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, LanguageFilter::All);

        let list: LanguageFilter = serde_json::from_str("[\"pol\", \"eng\"]").unwrap();
        assert_eq!(list, LanguageFilter::Only(vec!["pol".into(), "eng".into()]));

        assert!(serde_json::from_str::<LanguageFilter>("\"some\"").is_err());
    }

    #[test]
    fn default_language_outside_list_warns() {
        let mut cfg = Config::default();
        cfg.audio.languages = LanguageFilter::Only(vec!["eng".into()]);
        cfg.audio.default_language = Some("pol".into());
        let warnings = cfg.validate().unwrap();
        assert!(warnings.iter().any(|w| w.contains("audio.default_language")));
    }

    #[test]
    fn requested_policy_auto_uses_detected_encoder() {
        let cfg = VideoConfig::default();
        let policy = cfg.requested_policy(Some(EncoderKind::Amf));
        assert_eq!(policy.video_mode, VideoMode::Encode);
        assert_eq!(
            policy.encoder,
            Some(EncoderSettings::Amf {
                quality: AmfQuality::Quality,
                qp: 20
            })
        );

        let none = cfg.requested_policy(None);
        assert!(none.encoder.is_none());
    }

    #[test]
    fn requested_policy_passthrough_drops_encoder() {
        let cfg = VideoConfig {
            mode: VideoMode::Passthrough,
            encoder: EncoderChoice::Nvenc,
            ..VideoConfig::default()
        };
        assert!(cfg.requested_policy(Some(EncoderKind::Nvenc)).encoder.is_none());
    }

    #[test]
    fn explicit_encoder_wins_over_detection() {
        let cfg = VideoConfig {
            encoder: EncoderChoice::Nvenc,
            ..VideoConfig::default()
        };
        let policy = cfg.requested_policy(Some(EncoderKind::Amf));
        assert_eq!(policy.encoder.map(|e| e.kind()), Some(EncoderKind::Nvenc));
    }
}
