//! Streamed video ids

use std::sync::OnceLock;

use regex::Regex;

/// Length of a streamed video id
const VIDEO_ID_LEN: usize = 11;

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11})").expect("static video id pattern is valid")
    })
}

/// Pull the video id out of a watch/share/embed URL.
///
/// The id is the first run of 11 id characters following `v=` or a `/`.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_pattern()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| id.len() == VIDEO_ID_LEN)
}
