//! Matroska global tags written alongside the mux.

use mf_probe::{ContentLightLevel, MasteringDisplay, VideoStreamInfo};

/// Ordered set of `<Simple>` name/value tags for the whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: Vec<(String, String)>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Add static HDR10 tags: `MASTERING_METADATA` with primaries scaled by
    /// 50000 and luminance by 10000, plus non-zero `MAX_CLL` / `MAX_FALL`.
    pub fn push_hdr10(&mut self, video: &VideoStreamInfo) {
        if let Some(md) = &video.mastering_display {
            self.push("MASTERING_METADATA", mastering_metadata(md));
        }
        if let Some(ContentLightLevel { max_cll, max_fall }) = video.content_light {
            if max_cll > 0 {
                self.push("MAX_CLL", max_cll.to_string());
            }
            if max_fall > 0 {
                self.push("MAX_FALL", max_fall.to_string());
            }
        }
    }

    /// Render as a mkvmerge `--global-tags` XML document.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Tags>\n  <Tag>\n    <Targets />\n");
        for (name, value) in &self.entries {
            xml.push_str(&format!(
                "    <Simple>\n      <Name>{}</Name>\n      <String>{}</String>\n    </Simple>\n",
                escape(name),
                escape(value)
            ));
        }
        xml.push_str("  </Tag>\n</Tags>\n");
        xml
    }
}

fn mastering_metadata(md: &MasteringDisplay) -> String {
    let c = |v: f64| (v * 50_000.0).round() as i64;
    let l = |v: f64| (v * 10_000.0).round() as i64;
    format!(
        "G({},{})B({},{})R({},{})WP({},{})L({},{})",
        c(md.green.0),
        c(md.green.1),
        c(md.blue.0),
        c(md.blue.1),
        c(md.red.0),
        c(md.red.1),
        c(md.white_point.0),
        c(md.white_point.1),
        l(md.max_luminance),
        l(md.min_luminance)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
