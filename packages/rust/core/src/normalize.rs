//! Location normalization.
//!
//! Raw location strings become stable graph keys by dropping the fragment.
//! Parsing failures never surface: the trimmed input is used as-is.

use url::Url;

const ELLIPSIS: &str = "...";

/// Canonicalize a raw URL string into a graph key.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// True when `raw` parses as an absolute URL.
pub fn is_location(raw: &str) -> bool {
    Url::parse(raw.trim()).is_ok()
}

/// Path and query of the normalized location, truncated to `width` characters.
pub fn display_path(raw: &str, width: usize) -> String {
    truncate(&path_and_query(&normalize(raw)), width)
}

/// Truncate to at most `max` characters, marking the cut with `...`.
///
/// Widths too narrow for the marker get a plain cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS.len() {
        return s.chars().take(max).collect();
    }
    let mut out: String = s.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Path plus non-empty query of a normalized key, without truncation.
fn path_and_query(key: &str) -> String {
    match Url::parse(key) {
        Ok(url) => match url.query() {
            Some(q) if !q.is_empty() => format!("{}?{q}", url.path()),
            _ => url.path().to_string(),
        },
        // Skip past a scheme like "https://" before looking for the path.
        Err(_) => key
            .char_indices()
            .skip(8)
            .find(|(_, c)| *c == '/')
            .map(|(i, _)| key[i..].to_string())
            .unwrap_or_else(|| key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitetrail_shared::DEFAULT_LABEL_WIDTH;

    #[test]
    fn strips_fragment() {
        assert_eq!(
            normalize("https://app.example.com/projects#settings"),
            "https://app.example.com/projects"
        );
        assert_eq!(
            normalize("https://app.example.com/#/inbox"),
            "https://app.example.com/"
        );
    }

    #[test]
    fn keeps_query() {
        assert_eq!(
            normalize("https://app.example.com/search?q=rust#top"),
            "https://app.example.com/search?q=rust"
        );
    }

    #[test]
    fn unparseable_input_passes_through() {
        assert_eq!(normalize("not a url"), "not a url");
        assert_eq!(normalize("  /relative/path  "), "/relative/path");
        assert_eq!(normalize(""), "");
        assert!(!is_location("not a url"));
        assert!(is_location("https://app.example.com"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("https://App.Example.com/a/b?x=1#frag");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn display_path_includes_query() {
        assert_eq!(
            display_path(
                "https://app.example.com/reports?range=30d#chart",
                DEFAULT_LABEL_WIDTH
            ),
            "/reports?range=30d"
        );
        assert_eq!(display_path("https://app.example.com", DEFAULT_LABEL_WIDTH), "/");
    }

    #[test]
    fn display_path_fallback_for_unparseable() {
        assert_eq!(display_path("::not a url/path", DEFAULT_LABEL_WIDTH), "/path");
        assert_eq!(display_path("short", DEFAULT_LABEL_WIDTH), "short");
    }

    #[test]
    fn display_path_truncates_long_paths() {
        let long = format!("https://app.example.com/{}", "a".repeat(200));
        let shown = display_path(&long, DEFAULT_LABEL_WIDTH);
        assert_eq!(shown.chars().count(), DEFAULT_LABEL_WIDTH);
        assert!(shown.ends_with("..."));

        let narrow = display_path(&long, 10);
        assert_eq!(narrow, "/aaaaaa...");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("short", 80), "short");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn truncate_never_exceeds_width() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("abcdef", 2), "ab");
        assert_eq!(truncate("abcdef", 0), "");
        for max in 0..8 {
            assert!(truncate("abcdefghij", max).chars().count() <= max);
        }
    }
}
