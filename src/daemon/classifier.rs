//! Maps raw window titles and idle measurements to normalized activity
//! names. Pure and total: malformed titles degrade to passthrough text.

use std::sync::Arc;

use crate::storage::activity::{IDLE_NAME, NO_WINDOW_NAME};

/// Known applications, checked as case-insensitive substrings of the title.
/// First match in table order wins.
const KNOWN_APPS: &[(&str, &str)] = &[
    ("google chrome", "Google Chrome"),
    ("mozilla firefox", "Mozilla Firefox"),
    ("microsoft edge", "Microsoft Edge"),
    ("file explorer", "File Explorer"),
    ("visual studio code", "VS Code"),
    ("vscode", "VS Code"),
    ("pycharm", "PyCharm"),
    ("slack", "Slack"),
    ("zoom", "Zoom"),
    ("terminal", "Terminal/CMD"),
    ("cmd.exe", "Terminal/CMD"),
    ("powershell", "Terminal/CMD"),
];

/// Classifies one observation. An idle measurement at or past the threshold
/// wins over whatever window is focused; a threshold of zero disables idle
/// detection.
pub fn classify(
    raw_title: Option<&str>,
    idle_seconds: u64,
    idle_threshold_seconds: u64,
) -> Arc<str> {
    if idle_threshold_seconds > 0 && idle_seconds >= idle_threshold_seconds {
        return IDLE_NAME.into();
    }
    normalize_title(raw_title)
}

/// Normalizes a raw window title to an application name: the known-app table
/// first, then the trailing segment of `" - "` or `" | "` separated titles,
/// then the trimmed title itself.
pub fn normalize_title(raw_title: Option<&str>) -> Arc<str> {
    let Some(title) = raw_title else {
        return NO_WINDOW_NAME.into();
    };
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return NO_WINDOW_NAME.into();
    }

    let lower = trimmed.to_lowercase();
    for (needle, app_name) in KNOWN_APPS {
        if lower.contains(needle) {
            return (*app_name).into();
        }
    }

    for separator in [" - ", " | "] {
        if trimmed.contains(separator) {
            let tail = trimmed.rsplit(separator).next().unwrap_or("").trim();
            if !tail.is_empty() {
                return tail.into();
            }
        }
    }

    trimmed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_threshold_beats_the_title() {
        assert_eq!(classify(Some("PyCharm"), 301, 300).as_ref(), IDLE_NAME);
        // Exactly at the threshold counts as idle.
        assert_eq!(classify(Some("PyCharm"), 300, 300).as_ref(), IDLE_NAME);
        assert_eq!(classify(Some("PyCharm"), 299, 300).as_ref(), "PyCharm");
    }

    #[test]
    fn zero_threshold_disables_idle_detection() {
        assert_eq!(classify(Some("PyCharm"), 100_000, 0).as_ref(), "PyCharm");
    }

    #[test]
    fn missing_titles_become_the_no_window_sentinel() {
        assert_eq!(classify(None, 0, 300).as_ref(), NO_WINDOW_NAME);
        assert_eq!(classify(Some("   "), 0, 300).as_ref(), NO_WINDOW_NAME);
        assert_eq!(classify(Some(""), 0, 300).as_ref(), NO_WINDOW_NAME);
    }

    #[test]
    fn known_apps_match_case_insensitively() {
        assert_eq!(
            normalize_title(Some("Vibing in YouTube - Google Chrome")).as_ref(),
            "Google Chrome"
        );
        assert_eq!(normalize_title(Some("main.rs - VSCODE")).as_ref(), "VS Code");
        assert_eq!(
            normalize_title(Some("C:\\Windows\\cmd.exe")).as_ref(),
            "Terminal/CMD"
        );
    }

    #[test]
    fn table_order_decides_ambiguous_titles() {
        // Matches both "google chrome" and "slack"; the table entry that
        // appears first wins.
        assert_eq!(
            normalize_title(Some("Slack - Google Chrome")).as_ref(),
            "Google Chrome"
        );
    }

    #[test]
    fn unknown_titles_fall_back_to_separator_splitting() {
        assert_eq!(
            normalize_title(Some("Document1 - Microsoft Word")).as_ref(),
            "Microsoft Word"
        );
        assert_eq!(
            normalize_title(Some("inbox | Proton Mail")).as_ref(),
            "Proton Mail"
        );
        // The last segment wins when the separator repeats.
        assert_eq!(
            normalize_title(Some("a - b - Some App")).as_ref(),
            "Some App"
        );
    }

    #[test]
    fn plain_titles_pass_through_trimmed() {
        assert_eq!(normalize_title(Some("  Blender  ")).as_ref(), "Blender");
    }
}
