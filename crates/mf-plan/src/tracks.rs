//! Audio and subtitle track selection.

use std::path::PathBuf;

use mf_core::config::{DefaultMode, LanguageFilter, SelectionPolicy, TrackSelectionConfig};
use mf_core::TrackKind;
use mf_probe::MediaTrack;
use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;

/// A track supplied as a separate file, muxed after the selected internal
/// tracks of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTrack {
    pub kind: TrackKind,
    pub path: PathBuf,
    pub language: String,
    pub title: Option<String>,
}

/// Result of applying selection rules to one track kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSelection {
    /// Selected internal tracks in mux order.
    pub tracks: Vec<MediaTrack>,
    /// Position of the default track among the selected internal tracks
    /// followed by the external ones.
    pub default_index: Option<usize>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Select tracks of `kind` from `available` according to `rules`.
///
/// With `best_per_language`, each requested language contributes at most one
/// track: the one whose codec ranks highest in `preferred_codecs` (unlisted
/// codecs rank lowest, ties go to the earlier track). Tracks whose title
/// contains an excluded fragment are never chosen.
pub fn select_tracks(
    available: &[MediaTrack],
    external: &[ExternalTrack],
    rules: &TrackSelectionConfig,
    kind: TrackKind,
) -> TrackSelection {
    let mut diagnostics = Vec::new();

    let tracks: Vec<MediaTrack> = match rules.policy {
        SelectionPolicy::All => available.to_vec(),
        SelectionPolicy::BestPerLanguage => {
            let present = languages_in_order(available);
            let wanted: Vec<String> = match &rules.languages {
                LanguageFilter::All => present,
                LanguageFilter::Only(langs) => langs
                    .iter()
                    .filter(|lang| {
                        let found = present.contains(lang);
                        if !found {
                            diagnostics.push(Diagnostic::warn(format!(
                                "No {kind} track in language '{lang}'; skipping it"
                            )));
                        }
                        found
                    })
                    .cloned()
                    .collect(),
            };

            wanted
                .iter()
                .filter_map(|lang| best_for_language(available, lang, rules, &mut diagnostics))
                .cloned()
                .collect()
        }
    };

    let external: Vec<&ExternalTrack> = external.iter().filter(|e| e.kind == kind).collect();
    let languages = tracks
        .iter()
        .map(|t| t.language.as_str())
        .chain(external.iter().map(|e| e.language.as_str()));
    let total = tracks.len() + external.len();

    let by_language = rules
        .default_language
        .as_deref()
        .and_then(|default| languages.clone().position(|lang| lang == default));

    let default_index = by_language.or_else(|| {
        let first_allowed = match kind {
            TrackKind::Audio => true,
            TrackKind::Subtitle => rules.default_mode == DefaultMode::First,
        };
        (first_allowed && total > 0).then_some(0)
    });

    if tracks.is_empty() && external.is_empty() && !available.is_empty() {
        diagnostics.push(Diagnostic::warn(format!(
            "None of the {} {kind} track(s) matched the selection rules",
            available.len()
        )));
    }

    TrackSelection {
        tracks,
        default_index,
        diagnostics,
    }
}

fn best_for_language<'a>(
    available: &'a [MediaTrack],
    lang: &str,
    rules: &TrackSelectionConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<&'a MediaTrack> {
    let mut best: Option<(&MediaTrack, usize)> = None;

    for track in available.iter().filter(|t| t.language == lang) {
        if let Some(fragment) = excluded_by(track, &rules.exclude_titles_containing) {
            diagnostics.push(Diagnostic::info(format!(
                "Skipping {} track {} ('{}'): title contains '{fragment}'",
                track.kind,
                track.index,
                track.title.as_deref().unwrap_or_default()
            )));
            continue;
        }

        let score = codec_score(&track.codec_name, &rules.preferred_codecs);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((track, score));
        }
    }

    best.map(|(track, _)| track)
}

/// `len - position` for listed codecs, 1 for everything else.
fn codec_score(codec: &str, preferred: &[String]) -> usize {
    preferred
        .iter()
        .position(|c| c == codec)
        .map_or(1, |i| preferred.len() - i)
}

fn excluded_by<'r>(track: &MediaTrack, exclusions: &'r [String]) -> Option<&'r str> {
    let title = track.title.as_deref()?.to_lowercase();
    exclusions
        .iter()
        .find(|fragment| title.contains(&fragment.to_lowercase()))
        .map(String::as_str)
}

fn languages_in_order(tracks: &[MediaTrack]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in tracks {
        if !out.contains(&t.language) {
            out.push(t.language.clone());
        }
    }
    out
}
