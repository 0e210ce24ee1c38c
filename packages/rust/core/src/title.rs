//! Title policy: which page title to keep for a node.
//!
//! Prefers the most descriptive title ever seen and always lets a real title
//! replace a placeholder such as "Home".

use std::sync::LazyLock;

use regex::Regex;

/// Titles that say nothing about the page they belong to.
const GENERIC_TITLES: &[&str] = &["home", "dashboard"];

/// True for empty/whitespace titles and known placeholders (case-insensitive).
pub fn is_generic(title: &str) -> bool {
    let t = title.trim();
    t.is_empty()
        || GENERIC_TITLES
            .iter()
            .any(|generic| t.eq_ignore_ascii_case(generic))
}

/// Whether `candidate` should overwrite `existing`.
pub fn should_replace(existing: &str, candidate: &str) -> bool {
    let existing = existing.trim();
    existing.is_empty()
        || is_generic(existing)
        || candidate.trim().chars().count() > existing.chars().count()
}

/// Remove a leading `"Brand | "` prefix, e.g. `"Acme | Billing"` -> `"Billing"`.
pub fn strip_branding(raw: &str) -> String {
    static BRAND_PREFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[^|]{2,}\|\s*").expect("valid regex"));

    let t = raw.trim();
    if t.is_empty() {
        return String::new();
    }
    BRAND_PREFIX_RE.replace(t, "").trim().to_string()
}

/// Merge a raw observed title into the stored one.
///
/// Returns the title to store, or `None` to keep `existing`. A candidate that
/// is empty after branding removal never replaces anything.
pub fn merge_title(existing: &str, raw_candidate: &str) -> Option<String> {
    let candidate = strip_branding(raw_candidate);
    if candidate.is_empty() || candidate == existing.trim() {
        return None;
    }
    should_replace(existing, &candidate).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_titles() {
        assert!(is_generic(""));
        assert!(is_generic("   "));
        assert!(is_generic("Home"));
        assert!(is_generic(" DASHBOARD "));
        assert!(!is_generic("Home Settings"));
        assert!(!is_generic("Billing"));
    }

    #[test]
    fn generic_existing_is_replaced() {
        assert!(should_replace("Home", "Pricing Plans"));
        assert_eq!(
            merge_title("Home", "Pricing Plans").as_deref(),
            Some("Pricing Plans")
        );
        // Even a shorter title beats a placeholder.
        assert_eq!(merge_title("Dashboard", "Team").as_deref(), Some("Team"));
    }

    #[test]
    fn longer_title_wins() {
        assert!(!should_replace("Detailed Report", "Report"));
        assert_eq!(merge_title("Detailed Report", "Report"), None);
        assert_eq!(
            merge_title("Report", "Detailed Report").as_deref(),
            Some("Detailed Report")
        );
    }

    #[test]
    fn equal_length_keeps_existing() {
        assert!(!should_replace("Alpha", "Omega"));
    }

    #[test]
    fn empty_existing_takes_anything_non_empty() {
        assert_eq!(merge_title("", "Billing").as_deref(), Some("Billing"));
        assert_eq!(merge_title("", "   "), None);
        assert_eq!(merge_title("", "Acme | "), None);
    }

    #[test]
    fn branding_is_stripped() {
        assert_eq!(strip_branding("Acme | Billing"), "Billing");
        assert_eq!(strip_branding("  Acme Cloud |Team members "), "Team members");
        assert_eq!(strip_branding("Billing"), "Billing");
        // A single character before the pipe is not a brand.
        assert_eq!(strip_branding("A| Billing"), "A| Billing");
        assert_eq!(strip_branding(""), "");
    }

    #[test]
    fn branding_stripped_before_comparison() {
        assert_eq!(
            merge_title("Billing", "Acme | Billing History").as_deref(),
            Some("Billing History")
        );
        assert_eq!(merge_title("Billing History", "Acme | Billing"), None);
    }
}
