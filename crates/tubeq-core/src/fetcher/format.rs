//! yt-dlp format selection for a quality / format kind pair.

use crate::types::{FormatKind, Quality};

/// Format selector string passed to `-f`.
///
/// Audio kinds ignore the quality ceiling.
pub fn format_selector(quality: Quality, format_kind: FormatKind) -> String {
    match format_kind {
        FormatKind::AudioMp3 => "bestaudio/best".to_string(),
        FormatKind::AudioM4a => "bestaudio[ext=m4a]/bestaudio/best".to_string(),
        FormatKind::Video => match quality.max_height() {
            None => "bestvideo+bestaudio/best".to_string(),
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
        },
    }
}
