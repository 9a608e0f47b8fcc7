// Text processing utilities

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

/// String manipulation utilities
pub mod string {
    use super::*;

    /// Keep the first `max_graphemes` grapheme clusters, appending `...`
    /// when anything was cut.
    pub fn ellipsize(text: &str, max_graphemes: usize) -> String {
        let mut graphemes = text.graphemes(true);
        let head: String = graphemes.by_ref().take(max_graphemes).collect();
        if graphemes.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }

    /// Truncate text so the result, ellipsis included, fits in `max_length`
    /// grapheme clusters
    pub fn truncate(text: &str, max_length: usize) -> String {
        let length = text.graphemes(true).count();
        if length <= max_length {
            text.to_string()
        } else if max_length <= 3 {
            "...".to_string()
        } else {
            ellipsize(text, max_length - 3)
        }
    }

    /// Word wrap text to specified width, preserving explicit line breaks
    pub fn word_wrap(text: &str, width: usize) -> Vec<String> {
        if width == 0 {
            return vec![text.to_string()];
        }

        textwrap::wrap(text, width)
            .into_iter()
            .map(|line| line.into_owned())
            .collect()
    }

    /// Collapse runs of whitespace into single spaces
    pub fn normalize_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Formatting utilities
pub mod format {
    use super::*;

    /// Human readable age of a timestamp, e.g. `3h 12m ago`
    pub fn format_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let elapsed = match (now - timestamp).to_std() {
            Ok(elapsed) => elapsed,
            Err(_) => return "just now".to_string(),
        };

        if elapsed.as_secs() < 60 {
            return "just now".to_string();
        }

        // Minute precision is plenty for a session list
        let rounded = std::time::Duration::from_secs(elapsed.as_secs() / 60 * 60);
        let parts: Vec<String> = humantime::format_duration(rounded)
            .to_string()
            .split(' ')
            .take(2)
            .map(str::to_string)
            .collect();

        format!("{} ago", parts.join(" "))
    }

    /// Score in `[0, 1]` as a percentage string
    pub fn format_percent(score: f64) -> String {
        format!("{:.0}%", score.clamp(0.0, 1.0) * 100.0)
    }
}
